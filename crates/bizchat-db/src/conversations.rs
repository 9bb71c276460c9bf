//! Conversation store: session-keyed, append-only message logs.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::MutexGuard;

use crate::model::{
    Conversation, ConversationFilter, ConversationStatus, ConversationSummary, Feedback, Message,
    MessageRole,
};
use crate::{format_ts, json_column, parse_ts, StoreError};

/// Result of appending one message.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub message: Message,
    /// Status the row had before this write (after the idle rule ran).
    pub previous_status: ConversationStatus,
    pub status: ConversationStatus,
}

/// Conversations store with a borrowed connection.
pub struct Conversations<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> Conversations<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Insert a conversation together with its initial messages.
    ///
    /// Returns `false` and writes nothing when a conversation with the same
    /// key already exists.
    pub fn create(&self, conversation: &Conversation) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let inserted = tx.execute(
            r#"
            INSERT INTO conversations (
                chatbot_id, session_id, status, metadata, customer_info, tags,
                feedback, created_at, last_activity_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(chatbot_id, session_id) DO NOTHING
            "#,
            params![
                conversation.chatbot_id,
                conversation.session_id,
                conversation.status.as_str(),
                serde_json::to_string(&conversation.metadata)?,
                serde_json::to_string(&conversation.customer_info)?,
                serde_json::to_string(&conversation.tags)?,
                conversation
                    .feedback
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                format_ts(&conversation.created_at),
                format_ts(&conversation.last_activity_at),
            ],
        )?;

        if inserted == 0 {
            return Ok(false);
        }

        for (seq, message) in conversation.messages.iter().enumerate() {
            tx.execute(
                "INSERT INTO messages (chatbot_id, session_id, seq, role, content, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation.chatbot_id,
                    conversation.session_id,
                    seq as i64,
                    message.role.as_str(),
                    message.content,
                    format_ts(&message.timestamp),
                ],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Get a conversation with its full message log, oldest message first.
    pub fn get(
        &self,
        chatbot_id: &str,
        session_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let conversation = self
            .conn
            .query_row(
                r#"
                SELECT chatbot_id, session_id, status, metadata, customer_info, tags,
                       feedback, created_at, last_activity_at
                FROM conversations WHERE chatbot_id = ?1 AND session_id = ?2
                "#,
                params![chatbot_id, session_id],
                Self::row_to_conversation,
            )
            .optional()?;

        match conversation {
            Some(mut c) => {
                c.messages = self.get_messages(chatbot_id, session_id)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// Mark active conversations of a chatbot whose last activity is older
    /// than `cutoff` as completed. Returns how many rows changed.
    pub fn expire_idle(
        &self,
        chatbot_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let changed = self.conn.execute(
            r#"
            UPDATE conversations SET status = 'completed'
            WHERE chatbot_id = ?1 AND status = 'active' AND last_activity_at < ?2
            "#,
            params![chatbot_id, format_ts(&cutoff)],
        )?;
        Ok(changed)
    }

    /// Append a message in one transaction.
    ///
    /// The idle rule runs first (active and idle longer than `idle_timeout`
    /// becomes completed), then the new message reactivates the conversation.
    /// The message gets the next sequence number for its conversation.
    pub fn append_message(
        &self,
        chatbot_id: &str,
        session_id: &str,
        role: MessageRole,
        content: &str,
        now: DateTime<Utc>,
        idle_timeout: Duration,
    ) -> Result<AppendOutcome, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let current: Option<(String, String)> = tx
            .query_row(
                "SELECT status, last_activity_at FROM conversations \
                 WHERE chatbot_id = ?1 AND session_id = ?2",
                params![chatbot_id, session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((status, last_activity_at)) = current else {
            return Err(StoreError::ConversationNotFound {
                chatbot_id: chatbot_id.to_string(),
                session_id: session_id.to_string(),
            });
        };

        let previous_status = status
            .parse::<ConversationStatus>()
            .unwrap_or_default()
            .expire_if_idle(parse_ts(&last_activity_at), now, idle_timeout);
        let status = previous_status.on_new_message();

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE chatbot_id = ?1 AND session_id = ?2",
            params![chatbot_id, session_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO messages (chatbot_id, session_id, seq, role, content, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chatbot_id,
                session_id,
                next_seq,
                role.as_str(),
                content,
                format_ts(&now)
            ],
        )?;

        tx.execute(
            "UPDATE conversations SET status = ?1, last_activity_at = ?2 \
             WHERE chatbot_id = ?3 AND session_id = ?4",
            params![status.as_str(), format_ts(&now), chatbot_id, session_id],
        )?;

        tx.commit()?;

        Ok(AppendOutcome {
            message: Message::new(role, content, now),
            previous_status,
            status,
        })
    }

    /// Persist the mutable attributes of a conversation. The message log is
    /// never rewritten here.
    pub fn save(&self, conversation: &Conversation) -> Result<bool, StoreError> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE conversations SET
                status = ?1,
                metadata = ?2,
                customer_info = ?3,
                tags = ?4,
                feedback = ?5,
                last_activity_at = ?6
            WHERE chatbot_id = ?7 AND session_id = ?8
            "#,
            params![
                conversation.status.as_str(),
                serde_json::to_string(&conversation.metadata)?,
                serde_json::to_string(&conversation.customer_info)?,
                serde_json::to_string(&conversation.tags)?,
                conversation
                    .feedback
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                format_ts(&conversation.last_activity_at),
                conversation.chatbot_id,
                conversation.session_id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Set the status directly (used for archiving).
    pub fn set_status(
        &self,
        chatbot_id: &str,
        session_id: &str,
        status: ConversationStatus,
    ) -> Result<bool, StoreError> {
        let rows_affected = self.conn.execute(
            "UPDATE conversations SET status = ?1 WHERE chatbot_id = ?2 AND session_id = ?3",
            params![status.as_str(), chatbot_id, session_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Store (or overwrite) the feedback for a conversation.
    pub fn set_feedback(
        &self,
        chatbot_id: &str,
        session_id: &str,
        feedback: &Feedback,
    ) -> Result<bool, StoreError> {
        let rows_affected = self.conn.execute(
            "UPDATE conversations SET feedback = ?1 WHERE chatbot_id = ?2 AND session_id = ?3",
            params![serde_json::to_string(feedback)?, chatbot_id, session_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// List conversation summaries for a chatbot, most recent activity first.
    pub fn list(
        &self,
        chatbot_id: &str,
        filter: &ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut sql = String::from(
            r#"
            SELECT c.chatbot_id, c.session_id, c.status, c.customer_info, c.tags, c.feedback,
                   c.created_at, c.last_activity_at,
                   (SELECT COUNT(*) FROM messages m
                    WHERE m.chatbot_id = c.chatbot_id AND m.session_id = c.session_id
                      AND m.role != 'system') AS message_count
            FROM conversations c WHERE c.chatbot_id = ?
            "#,
        );
        let mut param_values: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(chatbot_id.to_string())];

        if let Some(status) = filter.status {
            sql.push_str(" AND c.status = ?");
            param_values.push(Box::new(status.as_str()));
        }

        sql.push_str(" ORDER BY c.last_activity_at DESC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = filter.offset {
            if filter.limit.is_none() {
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        let params: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), Self::row_to_summary)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }

        Ok(summaries)
    }

    /// Count conversations for a chatbot, optionally by status.
    pub fn count(
        &self,
        chatbot_id: &str,
        status: Option<ConversationStatus>,
    ) -> Result<u64, StoreError> {
        let count: i64 = match status {
            Some(status) => self.conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE chatbot_id = ?1 AND status = ?2",
                params![chatbot_id, status.as_str()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE chatbot_id = ?1",
                params![chatbot_id],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    fn get_messages(&self, chatbot_id: &str, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT role, content, timestamp FROM messages \
             WHERE chatbot_id = ?1 AND session_id = ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![chatbot_id, session_id], |row| {
            let role: String = row.get(0)?;
            let timestamp: String = row.get(2)?;
            Ok((role, row.get::<_, String>(1)?, timestamp))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, timestamp) = row?;
            // Unknown roles cannot be written through this store; skip rather than fail.
            if let Ok(role) = role.parse::<MessageRole>() {
                messages.push(Message::new(role, content, parse_ts(&timestamp)));
            }
        }

        Ok(messages)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation, rusqlite::Error> {
        let status: String = row.get(2)?;
        let feedback: Option<String> = row.get(6)?;
        let created_at: String = row.get(7)?;
        let last_activity_at: String = row.get(8)?;

        Ok(Conversation {
            chatbot_id: row.get(0)?,
            session_id: row.get(1)?,
            status: status.parse().unwrap_or_default(),
            messages: Vec::new(),
            metadata: json_column(row, 3)?,
            customer_info: json_column(row, 4)?,
            tags: json_column(row, 5)?,
            feedback: feedback.and_then(|raw| serde_json::from_str(&raw).ok()),
            created_at: parse_ts(&created_at),
            last_activity_at: parse_ts(&last_activity_at),
        })
    }

    fn row_to_summary(row: &rusqlite::Row) -> Result<ConversationSummary, rusqlite::Error> {
        let status: String = row.get(2)?;
        let feedback: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        let last_activity_at: String = row.get(7)?;

        Ok(ConversationSummary {
            chatbot_id: row.get(0)?,
            session_id: row.get(1)?,
            status: status.parse().unwrap_or_default(),
            customer_info: json_column(row, 3)?,
            tags: json_column(row, 4)?,
            feedback: feedback.and_then(|raw| serde_json::from_str(&raw).ok()),
            created_at: parse_ts(&created_at),
            last_activity_at: parse_ts(&last_activity_at),
            message_count: row.get::<_, i64>(8)? as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusinessProfile, Database, Industry};

    fn setup() -> (Database, BusinessProfile) {
        let db = Database::open_in_memory().unwrap();
        let profile = BusinessProfile::new("owner-1", Industry::Restaurant, "Luigi's");
        db.profiles().insert(&profile).unwrap();
        (db, profile)
    }

    fn new_conversation(chatbot_id: &str, session_id: &str, now: DateTime<Utc>) -> Conversation {
        let mut conversation = Conversation::new(chatbot_id, session_id, now);
        conversation
            .messages
            .push(Message::new(MessageRole::System, "system prompt", now));
        conversation
            .messages
            .push(Message::new(MessageRole::Assistant, "welcome", now));
        conversation
    }

    #[test]
    fn test_create_is_idempotent() {
        let (db, profile) = setup();
        let now = Utc::now();
        let conversation = new_conversation(&profile.id, "s-1", now);

        assert!(db.conversations().create(&conversation).unwrap());
        assert!(!db.conversations().create(&conversation).unwrap());

        let loaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].role, MessageRole::System);
        assert_eq!(db.conversations().count(&profile.id, None).unwrap(), 1);
    }

    #[test]
    fn test_create_requires_existing_profile() {
        let (db, _) = setup();
        let conversation = new_conversation("no-such-bot", "s-1", Utc::now());
        assert!(db.conversations().create(&conversation).is_err());
    }

    #[test]
    fn test_append_keeps_call_order() {
        let (db, profile) = setup();
        let now = Utc::now();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", now))
            .unwrap();

        for i in 0..5 {
            db.conversations()
                .append_message(
                    &profile.id,
                    "s-1",
                    MessageRole::User,
                    &format!("message {}", i),
                    now,
                    Duration::minutes(30),
                )
                .unwrap();
        }

        let loaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        let contents: Vec<&str> = loaded.messages[2..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["message 0", "message 1", "message 2", "message 3", "message 4"]
        );
    }

    #[test]
    fn test_append_to_missing_conversation() {
        let (db, profile) = setup();
        let err = db
            .conversations()
            .append_message(
                &profile.id,
                "ghost",
                MessageRole::User,
                "hello",
                Utc::now(),
                Duration::minutes(30),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound { .. }));
    }

    #[test]
    fn test_idle_conversation_completes_then_reactivates() {
        let (db, profile) = setup();
        let now = Utc::now();
        let started = now - Duration::minutes(31);
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", started))
            .unwrap();

        let changed = db
            .conversations()
            .expire_idle(&profile.id, now - Duration::minutes(30))
            .unwrap();
        assert_eq!(changed, 1);
        let loaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        assert_eq!(loaded.status, ConversationStatus::Completed);

        let outcome = db
            .conversations()
            .append_message(
                &profile.id,
                "s-1",
                MessageRole::User,
                "are you still there?",
                now,
                Duration::minutes(30),
            )
            .unwrap();
        assert_eq!(outcome.previous_status, ConversationStatus::Completed);
        assert_eq!(outcome.status, ConversationStatus::Active);

        let loaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        assert_eq!(loaded.status, ConversationStatus::Active);
        assert!(outcome.message.timestamp - loaded.last_activity_at < Duration::microseconds(1));
    }

    #[test]
    fn test_append_after_gap_without_read_still_reactivates() {
        let (db, profile) = setup();
        let now = Utc::now();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", now - Duration::hours(2)))
            .unwrap();

        let outcome = db
            .conversations()
            .append_message(
                &profile.id,
                "s-1",
                MessageRole::User,
                "back again",
                now,
                Duration::minutes(30),
            )
            .unwrap();
        assert_eq!(outcome.previous_status, ConversationStatus::Completed);
        assert_eq!(outcome.status, ConversationStatus::Active);
    }

    #[test]
    fn test_archived_is_terminal() {
        let (db, profile) = setup();
        let now = Utc::now();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", now))
            .unwrap();
        assert!(db
            .conversations()
            .set_status(&profile.id, "s-1", ConversationStatus::Archived)
            .unwrap());

        let outcome = db
            .conversations()
            .append_message(
                &profile.id,
                "s-1",
                MessageRole::User,
                "hello?",
                now,
                Duration::minutes(30),
            )
            .unwrap();
        assert_eq!(outcome.status, ConversationStatus::Archived);
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let (db, profile) = setup();
        let now = Utc::now();
        for i in 0..5 {
            db.conversations()
                .create(&new_conversation(
                    &profile.id,
                    &format!("s-{}", i),
                    now - Duration::minutes(i),
                ))
                .unwrap();
        }
        db.conversations()
            .set_status(&profile.id, "s-4", ConversationStatus::Archived)
            .unwrap();

        let all = db
            .conversations()
            .list(&profile.id, &ConversationFilter::default())
            .unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].session_id, "s-0");
        assert_eq!(all[0].message_count, 1);

        let page = db
            .conversations()
            .list(
                &profile.id,
                &ConversationFilter {
                    limit: Some(2),
                    offset: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].session_id, "s-2");

        let archived = db
            .conversations()
            .list(
                &profile.id,
                &ConversationFilter {
                    status: Some(ConversationStatus::Archived),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(
            db.conversations()
                .count(&profile.id, Some(ConversationStatus::Active))
                .unwrap(),
            4
        );
    }

    #[test]
    fn test_feedback_overwrite() {
        let (db, profile) = setup();
        let now = Utc::now();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", now))
            .unwrap();

        let first = Feedback {
            rating: 2,
            comment: Some("slow".to_string()),
            submitted_at: now,
        };
        assert!(db.conversations().set_feedback(&profile.id, "s-1", &first).unwrap());

        let second = Feedback {
            rating: 5,
            comment: None,
            submitted_at: now,
        };
        db.conversations().set_feedback(&profile.id, "s-1", &second).unwrap();

        let loaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        assert_eq!(loaded.feedback.unwrap().rating, 5);
        assert!(!db.conversations().set_feedback(&profile.id, "nope", &second).unwrap());
    }

    #[test]
    fn test_save_updates_attributes_only() {
        let (db, profile) = setup();
        let now = Utc::now();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", now))
            .unwrap();

        let mut loaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        loaded.tags = vec!["vip".to_string()];
        loaded.customer_info.email = Some("ana@example.com".to_string());
        loaded.messages.clear();
        assert!(db.conversations().save(&loaded).unwrap());

        let reloaded = db.conversations().get(&profile.id, "s-1").unwrap().unwrap();
        assert_eq!(reloaded.tags, vec!["vip"]);
        assert_eq!(reloaded.customer_info.email.as_deref(), Some("ana@example.com"));
        assert_eq!(reloaded.messages.len(), 2);
    }

    #[test]
    fn test_profile_delete_cascades() {
        let (db, profile) = setup();
        let now = Utc::now();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-1", now))
            .unwrap();
        db.conversations()
            .create(&new_conversation(&profile.id, "s-2", now))
            .unwrap();

        db.profiles().delete(&profile.id).unwrap();

        assert_eq!(db.conversations().count(&profile.id, None).unwrap(), 0);
        assert!(db.conversations().get(&profile.id, "s-1").unwrap().is_none());
        assert_eq!(db.profiles().compute_stats(&profile.id).unwrap().total_messages, 0);
    }
}
