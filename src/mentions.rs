use std::collections::HashSet;

/// A reviewer identity extracted from a `/review` directive.
///
/// Teams are distinguished from individual users by the `org/team`
/// separator. The tag is computed once at extraction time so later stages
/// can partition on the variant instead of re-inspecting the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mention {
    User(String),
    Team(String),
}

impl Mention {
    /// Parse a single whitespace-delimited token from the directive line.
    /// A single leading `@` is stripped; the rest is kept verbatim.
    pub fn parse(token: &str) -> Self {
        let name = token.strip_prefix('@').unwrap_or(token);
        if name.contains('/') {
            Mention::Team(name.to_string())
        } else {
            Mention::User(name.to_string())
        }
    }

    /// The identity as it appears in check-run names, including the
    /// `org/team` separator for teams.
    pub fn name(&self) -> &str {
        match self {
            Mention::User(name) | Mention::Team(name) => name,
        }
    }

    pub fn is_team(&self) -> bool {
        matches!(self, Mention::Team(_))
    }
}

/// Extract the desired reviewer set from a pull request description.
///
/// Only the first line of the form `/review @a @b ...` is consulted; a
/// description declares one directive, and later ones are ignored. The
/// author is removed if present, since a self-review-request is never
/// valid. Identities are case-sensitive and deduplicated.
pub fn extract_mentions(body: &str, author: &str) -> HashSet<Mention> {
    for line in body.lines() {
        let Some(rest) = line.trim_start().strip_prefix("/review") else {
            continue;
        };
        // The token must be followed by whitespace, so that e.g. a line
        // starting with `/reviewers` is not a directive.
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        return rest
            .split_whitespace()
            .map(Mention::parse)
            .filter(|mention| mention.name() != author)
            .collect();
    }
    HashSet::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(mentions: &HashSet<Mention>) -> HashSet<&str> {
        mentions.iter().map(Mention::name).collect()
    }

    #[test]
    fn test_no_directive_yields_empty_set() {
        assert!(extract_mentions("Just a normal description.", "alice").is_empty());
        assert!(extract_mentions("", "alice").is_empty());
    }

    #[test]
    fn test_extracts_users_and_teams() {
        let mentions = extract_mentions("/review @alice @bob/core", "carol");
        assert_eq!(names(&mentions), HashSet::from(["alice", "bob/core"]));
        assert!(mentions.contains(&Mention::User("alice".to_string())));
        assert!(mentions.contains(&Mention::Team("bob/core".to_string())));
    }

    #[test]
    fn test_author_is_removed() {
        let mentions = extract_mentions("/review @alice @bob/core", "alice");
        assert_eq!(names(&mentions), HashSet::from(["bob/core"]));
    }

    #[test]
    fn test_at_prefix_is_optional() {
        let mentions = extract_mentions("/review alice @bob", "carol");
        assert_eq!(names(&mentions), HashSet::from(["alice", "bob"]));
    }

    #[test]
    fn test_only_first_directive_counts() {
        let body = "intro\n/review @alice\n/review @bob\n";
        let mentions = extract_mentions(body, "carol");
        assert_eq!(names(&mentions), HashSet::from(["alice"]));
    }

    #[test]
    fn test_leading_whitespace_allowed() {
        let mentions = extract_mentions("  \t/review @alice", "carol");
        assert_eq!(names(&mentions), HashSet::from(["alice"]));
    }

    #[test]
    fn test_bare_directive_is_skipped() {
        // `/review` with no argument list does not match; a later complete
        // directive still does.
        let body = "/review\n/review @alice";
        assert_eq!(names(&extract_mentions(body, "carol")), HashSet::from(["alice"]));
    }

    #[test]
    fn test_directive_with_only_whitespace_yields_empty_set() {
        assert!(extract_mentions("/review   \nmore text", "carol").is_empty());
    }

    #[test]
    fn test_prefix_word_is_not_a_directive() {
        assert!(extract_mentions("/reviewers @alice", "carol").is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let mentions = extract_mentions("/review @alice alice @alice", "carol");
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn test_case_sensitive() {
        let mentions = extract_mentions("/review @Alice @alice", "carol");
        assert_eq!(names(&mentions), HashSet::from(["Alice", "alice"]));
    }

    proptest! {
        #[test]
        fn prop_body_without_directive_yields_empty(body in "[a-zA-Z0-9@ \n.]{0,200}") {
            prop_assert!(extract_mentions(&body, "alice").is_empty());
        }

        #[test]
        fn prop_author_never_in_result(
            logins in proptest::collection::vec("[a-z]{1,8}", 1..6),
            pick in 0usize..6,
        ) {
            let author = logins[pick % logins.len()].clone();
            let line = logins
                .iter()
                .map(|l| format!("@{}", l))
                .collect::<Vec<_>>()
                .join(" ");
            let mentions = extract_mentions(&format!("/review {}", line), &author);
            prop_assert!(mentions.iter().all(|m| m.name() != author));
        }

        #[test]
        fn prop_all_tokens_extracted_modulo_author(
            logins in proptest::collection::hash_set("[a-z]{1,8}", 1..6),
        ) {
            let line = logins
                .iter()
                .map(|l| format!("@{}", l))
                .collect::<Vec<_>>()
                .join(" ");
            // Uppercase author cannot collide with the generated logins.
            let mentions = extract_mentions(&format!("/review {}", line), "OUTSIDER");
            let got: HashSet<String> =
                mentions.iter().map(|m| m.name().to_string()).collect();
            prop_assert_eq!(got, logins);
        }
    }
}
