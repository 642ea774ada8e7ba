//! Line-level model of the broker ACL file.
//!
//! The broker reads two directives that this crate writes:
//!
//! ```text
//! user <username>
//! topic [read|write|readwrite] <topic>
//! ```
//!
//! Everything else (comments, `pattern` lines, global topics before the first
//! `user` line) is classified as [`Directive::Other`] and written back
//! verbatim.

use std::fmt;

use aclsync_error::{AclError, NameKind};

/// Access granted by a `topic` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
    /// Recognised when parsing hand-edited files; never produced from flags.
    Deny,
    /// `topic <name>` with no access token.
    Unspecified,
}

impl Access {
    /// Maps the relational `can_read`/`can_write` pair onto an access token.
    pub fn from_flags(
        can_read: bool,
        can_write: bool,
    ) -> Self {
        match (can_read, can_write) {
            (true, true) => Access::ReadWrite,
            (true, false) => Access::Read,
            (false, true) => Access::Write,
            (false, false) => Access::Unspecified,
        }
    }

    pub fn token(self) -> Option<&'static str> {
        match self {
            Access::Read => Some("read"),
            Access::Write => Some("write"),
            Access::ReadWrite => Some("readwrite"),
            Access::Deny => Some("deny"),
            Access::Unspecified => None,
        }
    }

    pub fn parse_token(token: &str) -> Option<Self> {
        match token {
            "read" => Some(Access::Read),
            "write" => Some(Access::Write),
            "readwrite" => Some(Access::ReadWrite),
            "deny" => Some(Access::Deny),
            _ => None,
        }
    }
}

/// One `topic` line of a user block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPermission {
    pub topic: String,
    pub access: Access,
}

impl TopicPermission {
    pub fn new(
        topic: impl Into<String>,
        access: Access,
    ) -> Self {
        Self {
            topic: topic.into(),
            access,
        }
    }

    /// Renders the line exactly as the broker expects it, without newline.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TopicPermission {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.access.token() {
            Some(token) => write!(f, "topic {token} {}", self.topic),
            None => write!(f, "topic {}", self.topic),
        }
    }
}

/// A `user` line together with the topic lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBlock {
    pub username: String,
    pub topics: Vec<TopicPermission>,
}

/// Classification of a single raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    User(&'a str),
    Topic { access: Access, topic: &'a str },
    Blank,
    Other,
}

impl<'a> Directive<'a> {
    /// Classifies a line. A trailing `\r` (CRLF files) is ignored.
    pub fn parse(line: &'a str) -> Self {
        let content = line.trim();
        if content.is_empty() {
            return Directive::Blank;
        }

        let (keyword, rest) = split_keyword(content);
        match keyword {
            "user" if !rest.is_empty() => Directive::User(rest),
            "topic" if !rest.is_empty() => {
                let (first, tail) = split_keyword(rest);
                match Access::parse_token(first) {
                    Some(access) if !tail.is_empty() => Directive::Topic {
                        access,
                        topic: tail,
                    },
                    _ => Directive::Topic {
                        access: Access::Unspecified,
                        topic: rest,
                    },
                }
            }
            _ => Directive::Other,
        }
    }

    pub fn is_topic(
        &self,
        name: &str,
    ) -> bool {
        matches!(self, Directive::Topic { topic, .. } if *topic == name)
    }
}

fn split_keyword(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// Rejects names that would break the line-oriented format: empty values,
/// whitespace (the broker splits on it) and control characters (a newline
/// would inject a directive).
pub fn validate_name(
    kind: NameKind,
    value: &str,
) -> Result<(), AclError> {
    let bad = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control());
    if bad {
        return Err(AclError::InvalidName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(true, true, Access::ReadWrite, "topic readwrite a/b")]
    #[case(true, false, Access::Read, "topic read a/b")]
    #[case(false, true, Access::Write, "topic write a/b")]
    #[case(false, false, Access::Unspecified, "topic a/b")]
    fn test_flags_render(
        #[case] can_read: bool,
        #[case] can_write: bool,
        #[case] access: Access,
        #[case] line: &str,
    ) {
        assert_eq!(Access::from_flags(can_read, can_write), access);
        assert_eq!(TopicPermission::new("a/b", access).render(), line);
    }

    #[rstest]
    #[case("user alice", Directive::User("alice"))]
    #[case("user alice\r", Directive::User("alice"))]
    #[case("  user   bob@example.com ", Directive::User("bob@example.com"))]
    #[case("topic read sensors/temp", Directive::Topic { access: Access::Read, topic: "sensors/temp" })]
    #[case("topic readwrite x", Directive::Topic { access: Access::ReadWrite, topic: "x" })]
    #[case("topic deny secret/#", Directive::Topic { access: Access::Deny, topic: "secret/#" })]
    #[case("topic sensors/temp", Directive::Topic { access: Access::Unspecified, topic: "sensors/temp" })]
    #[case("topic read", Directive::Topic { access: Access::Unspecified, topic: "read" })]
    #[case("", Directive::Blank)]
    #[case("\r", Directive::Blank)]
    #[case("   ", Directive::Blank)]
    #[case("# comment", Directive::Other)]
    #[case("pattern read $SYS/#", Directive::Other)]
    #[case("user", Directive::Other)]
    #[case("username alice", Directive::Other)]
    fn test_directive_parse(
        #[case] line: &str,
        #[case] expected: Directive<'_>,
    ) {
        assert_eq!(Directive::parse(line), expected);
    }

    /// Совпадение идёт по имени топика целиком, а не по подстроке.
    #[test]
    fn test_is_topic_exact() {
        let d = Directive::parse("topic read sensors/temperature");
        assert!(d.is_topic("sensors/temperature"));
        assert!(!d.is_topic("sensors/temp"));
        assert!(!d.is_topic("temperature"));
    }

    #[rstest]
    #[case("")]
    #[case("two words")]
    #[case("new\nline")]
    #[case("tab\tbed")]
    fn test_validate_name_rejects(#[case] value: &str) {
        assert!(matches!(
            validate_name(NameKind::Topic, value),
            Err(AclError::InvalidName { kind: NameKind::Topic, .. })
        ));
    }

    #[test]
    fn test_validate_name_accepts() {
        assert!(validate_name(NameKind::User, "alice@example.com").is_ok());
        assert!(validate_name(NameKind::Topic, "sensors/+/temp").is_ok());
        assert!(validate_name(NameKind::Topic, "home/#").is_ok());
    }
}
