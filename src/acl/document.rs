use aclsync_error::AclError;

use super::{
    model::{Access, Directive, TopicPermission, UserBlock},
    scanner::{scan, BlockState},
};

/// In-memory copy of the ACL file as an ordered list of raw lines.
///
/// Mutations touch only the lines they target; every other line, including
/// its `\r` if the file uses CRLF, is written back byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclDocument {
    lines: Vec<String>,
}

impl AclDocument {
    pub fn parse(content: &str) -> Self {
        let mut lines: Vec<String> = content.split('\n').map(str::to_owned).collect();
        // `split` yields a trailing empty piece for "...\n" and for "".
        if content.is_empty() || content.ends_with('\n') {
            lines.pop();
        }
        Self { lines }
    }

    /// Serialises back to text; every line is `\n`-terminated.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains_user(
        &self,
        username: &str,
    ) -> bool {
        scan(&self.lines).any(|l| l.directive == Directive::User(username))
    }

    /// Appends a blank separator and `user <username>` unless the user is
    /// already present. Returns `true` if the document changed.
    pub fn register_user(
        &mut self,
        username: &str,
    ) -> bool {
        if self.contains_user(username) {
            return false;
        }
        self.lines.push(String::new());
        self.lines.push(format!("user {username}"));
        true
    }

    /// Grants `permission` to `username`.
    ///
    /// An existing line for the same topic is replaced in place; otherwise the
    /// new line becomes the first entry right after the `user` line.
    pub fn upsert_topic(
        &mut self,
        username: &str,
        permission: &TopicPermission,
    ) -> Result<(), AclError> {
        let mut user_line = None;
        let mut existing = None;

        for line in scan(&self.lines) {
            if user_line.is_none() && line.directive == Directive::User(username) {
                user_line = Some(line.index);
            }
            if existing.is_none()
                && line.state.is_inside(username)
                && line.directive.is_topic(&permission.topic)
            {
                existing = Some(line.index);
            }
        }

        let Some(user_idx) = user_line else {
            return Err(user_not_found(username));
        };

        let rendered = permission.render();
        match existing {
            Some(idx) => {
                self.lines[idx] = with_line_ending_of(&self.lines[idx], rendered);
            }
            None => {
                let line = with_line_ending_of(&self.lines[user_idx], rendered);
                self.lines.insert(user_idx + 1, line);
            }
        }
        Ok(())
    }

    /// Rewrites the access of an existing topic line inside the user's block.
    pub fn update_topic(
        &mut self,
        username: &str,
        permission: &TopicPermission,
    ) -> Result<(), AclError> {
        let (user_seen, targets) = self.topic_lines(username, &permission.topic);

        if !user_seen {
            return Err(user_not_found(username));
        }
        if targets.is_empty() {
            return Err(AclError::TopicNotFound {
                username: username.to_string(),
                topic: permission.topic.clone(),
            });
        }

        let rendered = permission.render();
        for idx in targets {
            self.lines[idx] = with_line_ending_of(&self.lines[idx], rendered.clone());
        }
        Ok(())
    }

    /// Drops every line for `topic` in the user's block, whatever its access
    /// token. Returns how many lines were removed; zero is not an error.
    pub fn delete_topic(
        &mut self,
        username: &str,
        topic: &str,
    ) -> Result<usize, AclError> {
        let (user_seen, targets) = self.topic_lines(username, topic);

        if !user_seen {
            return Err(user_not_found(username));
        }

        let removed = targets.len();
        let mut targets = targets.into_iter().peekable();
        let mut idx = 0;
        self.lines.retain(|_| {
            let drop_it = targets.next_if_eq(&idx).is_some();
            idx += 1;
            !drop_it
        });
        Ok(removed)
    }

    /// Access of the first line for `topic` in the user's block.
    pub fn topic_access(
        &self,
        username: &str,
        topic: &str,
    ) -> Option<Access> {
        scan(&self.lines)
            .filter(|line| line.state.is_inside(username))
            .find_map(|line| match line.directive {
                Directive::Topic { access, topic: t } if t == topic => Some(access),
                _ => None,
            })
    }

    /// Parsed view of every user block, in file order.
    pub fn users(&self) -> Vec<UserBlock> {
        let mut blocks: Vec<UserBlock> = Vec::new();
        for line in scan(&self.lines) {
            match (line.directive, line.state) {
                (Directive::User(name), _) => blocks.push(UserBlock {
                    username: name.to_string(),
                    topics: Vec::new(),
                }),
                (Directive::Topic { access, topic }, BlockState::InsideUser(_)) => {
                    if let Some(block) = blocks.last_mut() {
                        block.topics.push(TopicPermission::new(topic, access));
                    }
                }
                _ => {}
            }
        }
        blocks
    }

    /// Whether the user's `user` line was seen, plus the indices of its lines
    /// for `topic`, ascending.
    fn topic_lines(
        &self,
        username: &str,
        topic: &str,
    ) -> (bool, Vec<usize>) {
        let mut user_seen = false;
        let mut targets = Vec::new();
        for line in scan(&self.lines) {
            if line.directive == Directive::User(username) {
                user_seen = true;
            }
            if line.state.is_inside(username) && line.directive.is_topic(topic) {
                targets.push(line.index);
            }
        }
        (user_seen, targets)
    }
}

fn user_not_found(username: &str) -> AclError {
    AclError::UserNotFound {
        username: username.to_string(),
    }
}

fn with_line_ending_of(
    neighbour: &str,
    mut line: String,
) -> String {
    if neighbour.ends_with('\r') {
        line.push('\r');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(
        topic: &str,
        can_read: bool,
        can_write: bool,
    ) -> TopicPermission {
        TopicPermission::new(topic, Access::from_flags(can_read, can_write))
    }

    /// Сценарий из жизни: регистрация, добавление, обновление и удаление топика.
    #[test]
    fn test_example_scenario() {
        let mut doc = AclDocument::parse("");
        assert!(doc.register_user("alice"));
        assert_eq!(doc.render(), "\nuser alice\n");

        doc.upsert_topic("alice", &perm("sensors/temp", true, false))
            .unwrap();
        assert_eq!(doc.render(), "\nuser alice\ntopic read sensors/temp\n");

        doc.update_topic("alice", &perm("sensors/temp", true, true))
            .unwrap();
        assert_eq!(doc.render(), "\nuser alice\ntopic readwrite sensors/temp\n");

        assert_eq!(doc.delete_topic("alice", "sensors/temp").unwrap(), 1);
        assert_eq!(doc.render(), "\nuser alice\n");
    }

    #[test]
    fn test_parse_render_keeps_text() {
        for content in ["", "user a\n", "user a", "# c\r\nuser a\r\n\r\n"] {
            let doc = AclDocument::parse(content);
            let expected = if content.is_empty() || content.ends_with('\n') {
                content.to_string()
            } else {
                format!("{content}\n")
            };
            assert_eq!(doc.render(), expected);
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut doc = AclDocument::parse("\nuser alice\ntopic read a\n");
        assert!(!doc.register_user("alice"));
        assert_eq!(doc.render(), "\nuser alice\ntopic read a\n");
    }

    /// Новый топик вставляется первым в блоке пользователя.
    #[test]
    fn test_new_topic_goes_first_in_block() {
        let mut doc = AclDocument::parse("\nuser alice\ntopic read a\n\nuser bob\n");
        doc.upsert_topic("alice", &perm("b", false, true)).unwrap();
        assert_eq!(
            doc.render(),
            "\nuser alice\ntopic write b\ntopic read a\n\nuser bob\n"
        );
    }

    /// Повторное добавление существующего топика не создаёт дубликат.
    #[test]
    fn test_upsert_replaces_existing_line() {
        let mut doc = AclDocument::parse("\nuser alice\ntopic x\ntopic read a\n");
        doc.upsert_topic("alice", &perm("a", true, true)).unwrap();
        assert_eq!(doc.render(), "\nuser alice\ntopic x\ntopic readwrite a\n");
    }

    #[test]
    fn test_upsert_unknown_user() {
        let mut doc = AclDocument::parse("\nuser alice\n");
        let err = doc.upsert_topic("ghost", &perm("a", true, false)).unwrap_err();
        assert!(matches!(err, AclError::UserNotFound { ref username } if username == "ghost"));
        assert_eq!(doc.render(), "\nuser alice\n");
    }

    #[test]
    fn test_update_errors_leave_document_untouched() {
        let original = "\nuser alice\ntopic read a\n\nuser bob\ntopic read b\n";
        let mut doc = AclDocument::parse(original);

        let err = doc.update_topic("ghost", &perm("a", true, true)).unwrap_err();
        assert!(matches!(err, AclError::UserNotFound { .. }));

        let err = doc.update_topic("alice", &perm("b", true, true)).unwrap_err();
        assert!(
            matches!(err, AclError::TopicNotFound { ref username, ref topic } if username == "alice" && topic == "b")
        );
        assert_eq!(doc.render(), original);
    }

    /// Топик после пустой строки уже не принадлежит блоку пользователя.
    #[test]
    fn test_update_stops_at_blank_line() {
        let mut doc = AclDocument::parse("user alice\n\ntopic read a\n");
        let err = doc.update_topic("alice", &perm("a", true, true)).unwrap_err();
        assert!(matches!(err, AclError::TopicNotFound { .. }));
    }

    /// Совпадение по подстроке не должно затрагивать соседние топики.
    #[test]
    fn test_update_matches_whole_topic_name() {
        let mut doc =
            AclDocument::parse("\nuser alice\ntopic read sensors/temperature\ntopic read sensors/temp\n");
        doc.update_topic("alice", &perm("sensors/temp", false, true))
            .unwrap();
        assert_eq!(
            doc.render(),
            "\nuser alice\ntopic read sensors/temperature\ntopic write sensors/temp\n"
        );
    }

    #[test]
    fn test_update_to_unspecified_access() {
        let mut doc = AclDocument::parse("\nuser alice\ntopic readwrite a\n");
        doc.update_topic("alice", &perm("a", false, false)).unwrap();
        assert_eq!(doc.render(), "\nuser alice\ntopic a\n");
    }

    #[test]
    fn test_delete_matches_any_access_token() {
        for line in ["topic read t", "topic write t", "topic readwrite t", "topic t"] {
            let mut doc = AclDocument::parse(&format!("\nuser alice\n{line}\ntopic read keep\n"));
            assert_eq!(doc.delete_topic("alice", "t").unwrap(), 1, "line: {line}");
            assert_eq!(doc.render(), "\nuser alice\ntopic read keep\n");
        }
    }

    #[test]
    fn test_delete_is_idempotent_and_checks_user() {
        let mut doc = AclDocument::parse("\nuser alice\n");
        assert_eq!(doc.delete_topic("alice", "missing").unwrap(), 0);
        assert!(matches!(
            doc.delete_topic("ghost", "t"),
            Err(AclError::UserNotFound { .. })
        ));
    }

    /// Изменения в блоке одного пользователя не трогают чужие блоки.
    #[test]
    fn test_other_blocks_untouched() {
        let original = "# managed\ntopic read $SYS/#\n\nuser alice\ntopic read t\n\nuser bob\ntopic read t\n";
        let mut doc = AclDocument::parse(original);
        doc.delete_topic("alice", "t").unwrap();
        assert_eq!(
            doc.render(),
            "# managed\ntopic read $SYS/#\n\nuser alice\n\nuser bob\ntopic read t\n"
        );
    }

    #[test]
    fn test_crlf_lines_keep_their_ending() {
        let mut doc = AclDocument::parse("user alice\r\ntopic read a\r\n");
        doc.upsert_topic("alice", &perm("b", true, false)).unwrap();
        doc.update_topic("alice", &perm("a", true, true)).unwrap();
        assert_eq!(
            doc.render(),
            "user alice\r\ntopic read b\r\ntopic readwrite a\r\n"
        );
    }

    #[test]
    fn test_topic_access_is_scoped_to_block() {
        let doc = AclDocument::parse("\nuser alice\ntopic read t\n\nuser bob\ntopic write t\ntopic u\n");
        assert_eq!(doc.topic_access("alice", "t"), Some(Access::Read));
        assert_eq!(doc.topic_access("bob", "t"), Some(Access::Write));
        assert_eq!(doc.topic_access("bob", "u"), Some(Access::Unspecified));
        assert_eq!(doc.topic_access("alice", "u"), None);
        assert_eq!(doc.topic_access("ghost", "t"), None);
    }

    #[test]
    fn test_users_snapshot() {
        let doc = AclDocument::parse(
            "topic read global\n\nuser alice\ntopic read a\ntopic b\n\nuser bob\n# c\ntopic write x\n",
        );
        let users = doc.users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "alice");
        assert_eq!(
            users[0].topics,
            vec![
                TopicPermission::new("a", Access::Read),
                TopicPermission::new("b", Access::Unspecified)
            ]
        );
        assert_eq!(users[1].topics, vec![TopicPermission::new("x", Access::Write)]);
    }
}
