//! Business profile store.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::MutexGuard;

use crate::model::{BusinessProfile, UsageStats};
use crate::{format_ts, json_column, parse_ts, StoreError};

const PROFILE_COLUMNS: &str = "id, owner_id, industry, business_name, description, hours, \
     location, website, services, features, personality, communication_style, knowledge_focus, \
     custom_prompt, active, total_conversations, total_messages, last_active_at, created_at, updated_at";

/// Profiles store with a borrowed connection.
pub struct Profiles<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> Profiles<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Insert a new profile.
    pub fn insert(&self, profile: &BusinessProfile) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO profiles ({PROFILE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                profile.id,
                profile.owner_id,
                profile.industry.as_str(),
                profile.business_name,
                profile.description,
                profile.hours,
                profile.location,
                profile.website,
                serde_json::to_string(&profile.services)?,
                serde_json::to_string(&profile.features)?,
                profile.personality.as_str(),
                serde_json::to_string(&profile.communication_style)?,
                profile.knowledge_focus.as_str(),
                profile.custom_prompt,
                profile.active,
                profile.stats.total_conversations as i64,
                profile.stats.total_messages as i64,
                profile.stats.last_active_at.as_ref().map(format_ts),
                format_ts(&profile.created_at),
                format_ts(&profile.updated_at),
            ],
        )?;

        Ok(())
    }

    /// Get a profile by ID.
    pub fn get(&self, id: &str) -> Result<Option<BusinessProfile>, StoreError> {
        let profile = self
            .conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                params![id],
                Self::row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// List every profile owned by `owner_id`, newest first.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<BusinessProfile>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE owner_id = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id], Self::row_to_profile)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }

        Ok(profiles)
    }

    /// Overwrite the editable attributes of a profile. Ownership, creation
    /// time and usage statistics are left untouched.
    pub fn update(&self, profile: &BusinessProfile) -> Result<bool, StoreError> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE profiles SET
                industry = ?1,
                business_name = ?2,
                description = ?3,
                hours = ?4,
                location = ?5,
                website = ?6,
                services = ?7,
                features = ?8,
                personality = ?9,
                communication_style = ?10,
                knowledge_focus = ?11,
                custom_prompt = ?12,
                active = ?13,
                updated_at = ?14
            WHERE id = ?15
            "#,
            params![
                profile.industry.as_str(),
                profile.business_name,
                profile.description,
                profile.hours,
                profile.location,
                profile.website,
                serde_json::to_string(&profile.services)?,
                serde_json::to_string(&profile.features)?,
                profile.personality.as_str(),
                serde_json::to_string(&profile.communication_style)?,
                profile.knowledge_focus.as_str(),
                profile.custom_prompt,
                profile.active,
                format_ts(&profile.updated_at),
                profile.id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a profile. Conversations and messages go with it.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    /// Recount conversations and visible messages for a profile.
    pub fn compute_stats(&self, id: &str) -> Result<UsageStats, StoreError> {
        let (total_conversations, last_active_at): (i64, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MAX(last_activity_at) FROM conversations WHERE chatbot_id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let total_messages: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chatbot_id = ?1 AND role != 'system'",
            params![id],
            |row| row.get(0),
        )?;

        Ok(UsageStats {
            total_conversations: total_conversations as u64,
            total_messages: total_messages as u64,
            last_active_at: last_active_at.as_deref().map(parse_ts),
        })
    }

    /// Store recomputed usage statistics.
    pub fn update_stats(&self, id: &str, stats: &UsageStats) -> Result<bool, StoreError> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE profiles SET
                total_conversations = ?1,
                total_messages = ?2,
                last_active_at = ?3
            WHERE id = ?4
            "#,
            params![
                stats.total_conversations as i64,
                stats.total_messages as i64,
                stats.last_active_at.as_ref().map(format_ts),
                id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn row_to_profile(row: &rusqlite::Row) -> Result<BusinessProfile, rusqlite::Error> {
        let industry: String = row.get(2)?;
        let personality: String = row.get(10)?;
        let knowledge_focus: String = row.get(12)?;
        let last_active_at: Option<String> = row.get(17)?;
        let created_at: String = row.get(18)?;
        let updated_at: String = row.get(19)?;

        Ok(BusinessProfile {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            industry: industry.parse().unwrap_or_default(),
            business_name: row.get(3)?,
            description: row.get(4)?,
            hours: row.get(5)?,
            location: row.get(6)?,
            website: row.get(7)?,
            services: json_column(row, 8)?,
            features: json_column(row, 9)?,
            personality: personality.parse().unwrap_or_default(),
            communication_style: json_column(row, 11)?,
            knowledge_focus: knowledge_focus.parse().unwrap_or_default(),
            custom_prompt: row.get(13)?,
            active: row.get(14)?,
            stats: UsageStats {
                total_conversations: row.get::<_, i64>(15)? as u64,
                total_messages: row.get::<_, i64>(16)? as u64,
                last_active_at: last_active_at.as_deref().map(parse_ts),
            },
            created_at: parse_ts(&created_at),
            updated_at: parse_ts(&updated_at),
        })
    }
}
