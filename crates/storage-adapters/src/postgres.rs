//! # Postgres Record Store
//!
//! Relational `RecordStore` backed by sqlx/Postgres. Every state-changing
//! operation is one transaction with the shape lock, check, mutate, log:
//! the rows the decision depends on are locked (`FOR UPDATE` when the row
//! itself is mutated, `FOR SHARE` when it is only observed), the
//! precondition is enforced, the mutation runs with `RETURNING`, and one
//! audit row lands in the family's `*_logs` table before commit.
//!
//! Enum columns are stored as TEXT and decoded fail-closed: a value this
//! build does not know maps to `DomainError::MalformedRecord` rather than
//! a silent default.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use domains::{
    ActivationData, AuditAction, AuditEntry, AuditFamily, Comment, CommentStatus, DomainError,
    DomainResult, Gender, Photo, PhotoStatus, PostSurface, PostedMessage, Rate, RateValue,
    RecordStore, Topic, TopicStatus, User, UserRole, UserStatus,
};

const USER_COLS: &str =
    "id, external_id, nick, gender, status, role, avatar_ref, about, register_time, \
     last_activity_time";
const TOPIC_COLS: &str = "id, group_chat_ref, group_thread_ref, name, status, description";
const PHOTO_COLS: &str =
    "id, user_id, topic_id, moderation_chat_ref, moderation_message_ref, channel_chat_ref, \
     channel_message_ref, media_ref, description, status, create_time";
const RATE_COLS: &str = "id, user_id, topic_id, photo_id, value, create_time";
const COMMENT_COLS: &str = "id, user_id, topic_id, photo_id, message_ref, status, text, create_time";

fn db_err(err: sqlx::Error) -> DomainError {
    DomainError::Integration(format!("postgres: {err}"))
}

/// Write-path error mapping. Unique indexes back the preconditions the
/// transaction already checks; a violation slipping through the check
/// window is still a precondition failure, not an infrastructure error.
fn db_write_err(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(ref db) = err {
        match db.constraint() {
            Some("users_nick_lower_key") => {
                return DomainError::precondition("nick is already taken")
            }
            Some("rates_user_photo_key") => {
                return DomainError::precondition("photo is already rated by this user")
            }
            _ => {}
        }
    }
    db_err(err)
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    external_id: i64,
    nick: Option<String>,
    gender: Option<String>,
    status: String,
    role: String,
    avatar_ref: Option<String>,
    about: Option<String>,
    register_time: DateTime<Utc>,
    last_activity_time: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> DomainResult<User> {
        let status = UserStatus::parse(&self.status).ok_or_else(|| {
            DomainError::MalformedRecord(format!(
                "user {}: unknown status {:?}",
                self.id, self.status
            ))
        })?;
        let role = UserRole::parse(&self.role).ok_or_else(|| {
            DomainError::MalformedRecord(format!("user {}: unknown role {:?}", self.id, self.role))
        })?;
        let gender = match self.gender {
            Some(raw) => Some(Gender::parse(&raw).ok_or_else(|| {
                DomainError::MalformedRecord(format!("user {}: unknown gender {raw:?}", self.id))
            })?),
            None => None,
        };
        Ok(User {
            id: self.id,
            external_id: self.external_id,
            nick: self.nick,
            gender,
            status,
            role,
            avatar_ref: self.avatar_ref,
            about: self.about,
            register_time: self.register_time,
            last_activity_time: self.last_activity_time,
        })
    }
}

#[derive(FromRow)]
struct TopicRow {
    id: Uuid,
    group_chat_ref: i64,
    group_thread_ref: Option<i64>,
    name: String,
    status: String,
    description: String,
}

impl TopicRow {
    fn into_topic(self) -> DomainResult<Topic> {
        let status = TopicStatus::parse(&self.status).ok_or_else(|| {
            DomainError::MalformedRecord(format!(
                "topic {}: unknown status {:?}",
                self.id, self.status
            ))
        })?;
        Ok(Topic {
            id: self.id,
            group_chat_ref: self.group_chat_ref,
            group_thread_ref: self.group_thread_ref,
            name: self.name,
            status,
            description: self.description,
        })
    }
}

#[derive(FromRow)]
struct PhotoRow {
    id: Uuid,
    user_id: Uuid,
    topic_id: Uuid,
    moderation_chat_ref: Option<i64>,
    moderation_message_ref: Option<i64>,
    channel_chat_ref: Option<i64>,
    channel_message_ref: Option<i64>,
    media_ref: String,
    description: String,
    status: String,
    create_time: DateTime<Utc>,
}

impl PhotoRow {
    fn into_photo(self) -> DomainResult<Photo> {
        let status = PhotoStatus::parse(&self.status).ok_or_else(|| {
            DomainError::MalformedRecord(format!(
                "photo {}: unknown status {:?}",
                self.id, self.status
            ))
        })?;
        let moderation_post =
            posted_pair(self.id, self.moderation_chat_ref, self.moderation_message_ref)?;
        let channel_post = posted_pair(self.id, self.channel_chat_ref, self.channel_message_ref)?;
        Ok(Photo {
            id: self.id,
            user_id: self.user_id,
            topic_id: self.topic_id,
            moderation_post,
            channel_post,
            media_ref: self.media_ref,
            description: self.description,
            status,
            create_time: self.create_time,
        })
    }
}

/// Chat/message column pairs are written together; half a pair is a
/// malformed row.
fn posted_pair(
    photo_id: Uuid,
    chat_ref: Option<i64>,
    message_ref: Option<i64>,
) -> DomainResult<Option<PostedMessage>> {
    match (chat_ref, message_ref) {
        (Some(chat_ref), Some(message_ref)) => Ok(Some(PostedMessage {
            chat_ref,
            message_ref,
        })),
        (None, None) => Ok(None),
        _ => Err(DomainError::MalformedRecord(format!(
            "photo {photo_id}: partial posted-message column pair"
        ))),
    }
}

#[derive(FromRow)]
struct RateRow {
    id: Uuid,
    user_id: Uuid,
    topic_id: Uuid,
    photo_id: Uuid,
    value: i16,
    create_time: DateTime<Utc>,
}

impl RateRow {
    fn into_rate(self) -> DomainResult<Rate> {
        let value = RateValue::from_i16(self.value).ok_or_else(|| {
            DomainError::MalformedRecord(format!(
                "rate {}: value {} out of range",
                self.id, self.value
            ))
        })?;
        Ok(Rate {
            id: self.id,
            user_id: self.user_id,
            topic_id: self.topic_id,
            photo_id: self.photo_id,
            value,
            create_time: self.create_time,
        })
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    user_id: Uuid,
    topic_id: Uuid,
    photo_id: Uuid,
    message_ref: i64,
    status: String,
    text: String,
    create_time: DateTime<Utc>,
}

impl CommentRow {
    fn into_comment(self) -> DomainResult<Comment> {
        let status = CommentStatus::parse(&self.status).ok_or_else(|| {
            DomainError::MalformedRecord(format!(
                "comment {}: unknown status {:?}",
                self.id, self.status
            ))
        })?;
        Ok(Comment {
            id: self.id,
            user_id: self.user_id,
            topic_id: self.topic_id,
            photo_id: self.photo_id,
            message_ref: self.message_ref,
            status,
            text: self.text,
            create_time: self.create_time,
        })
    }
}

#[derive(FromRow)]
struct AuditRow {
    entity_id: Uuid,
    actor_user_id: Uuid,
    action: String,
    resulting_status: String,
    resulting_role: Option<String>,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_entry(self) -> DomainResult<AuditEntry> {
        let action = AuditAction::parse(&self.action).ok_or_else(|| {
            DomainError::MalformedRecord(format!(
                "audit row for {}: unknown action {:?}",
                self.entity_id, self.action
            ))
        })?;
        Ok(AuditEntry {
            entity_id: self.entity_id,
            actor_user_id: self.actor_user_id,
            action,
            resulting_status: self.resulting_status,
            resulting_role: self.resulting_role,
            data: self.data,
            created_at: self.created_at,
        })
    }
}

fn log_table(family: AuditFamily) -> &'static str {
    match family {
        AuditFamily::User => "user_logs",
        AuditFamily::Topic => "topic_logs",
        AuditFamily::Photo => "photo_logs",
        AuditFamily::Rate => "rate_logs",
        AuditFamily::Comment => "comment_logs",
    }
}

#[allow(clippy::too_many_arguments)]
async fn append_log(
    conn: &mut PgConnection,
    family: AuditFamily,
    entity_id: Uuid,
    actor_user_id: Uuid,
    action: AuditAction,
    resulting_status: &str,
    resulting_role: Option<&str>,
    data: serde_json::Value,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    let sql = format!(
        "INSERT INTO {} (entity_id, actor_user_id, action, resulting_status, resulting_role, \
         data, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        log_table(family)
    );
    sqlx::query(&sql)
        .bind(entity_id)
        .bind(actor_user_id)
        .bind(action.as_str())
        .bind(resulting_status)
        .bind(resulting_role)
        .bind(data)
        .bind(at)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn lock_user(conn: &mut PgConnection, user_id: Uuid, for_update: bool) -> DomainResult<User> {
    let clause = if for_update { "FOR UPDATE" } else { "FOR SHARE" };
    let sql = format!("SELECT {USER_COLS} FROM users WHERE id = $1 {clause}");
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DomainError::NotFound("User", user_id.to_string()))?
        .into_user()
}

async fn lock_photo(
    conn: &mut PgConnection,
    photo_id: Uuid,
    for_update: bool,
) -> DomainResult<Photo> {
    let clause = if for_update { "FOR UPDATE" } else { "FOR SHARE" };
    let sql = format!("SELECT {PHOTO_COLS} FROM photos WHERE id = $1 {clause}");
    sqlx::query_as::<_, PhotoRow>(&sql)
        .bind(photo_id)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DomainError::NotFound("Photo", photo_id.to_string()))?
        .into_photo()
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies embedded migrations. Run once at startup, before any
    /// traffic reaches the store.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| DomainError::Integration(format!("migration: {err}")))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn authorize_or_create(&self, external_id: i64) -> DomainResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let select = format!("SELECT {USER_COLS} FROM users WHERE external_id = $1 FOR SHARE");

        if let Some(row) = sqlx::query_as::<_, UserRow>(&select)
            .bind(external_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
        {
            tx.commit().await.map_err(db_err)?;
            return row.into_user();
        }

        // Insert-or-fetch: a concurrent first contact may win the insert.
        // `ON CONFLICT DO NOTHING` plus the re-select below makes both
        // callers converge on the same row.
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO users (id, external_id, status, role, register_time, \
             last_activity_time) VALUES ($1, $2, 'register', 'user', $3, $3) \
             ON CONFLICT (external_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(external_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if inserted.rows_affected() == 1 {
            append_log(
                &mut tx,
                AuditFamily::User,
                user_id,
                user_id,
                AuditAction::UserRegister,
                UserStatus::Register.as_str(),
                Some(UserRole::User.as_str()),
                json!({ "external_id": external_id }),
                now,
            )
            .await?;
        }

        let row = sqlx::query_as::<_, UserRow>(&select)
            .bind(external_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        row.into_user()
    }

    async fn activate_user(
        &self,
        user_id: Uuid,
        activation: ActivationData,
    ) -> DomainResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let taken: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM users WHERE lower(nick) = lower($1) AND id <> $2")
                .bind(&activation.nick)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        if taken.is_some() {
            return Err(DomainError::precondition(format!(
                "nick {} is already taken",
                activation.nick
            )));
        }

        let user = lock_user(&mut tx, user_id, true).await?;
        if user.status != UserStatus::Register {
            return Err(DomainError::precondition(format!(
                "user {user_id} is not in register status"
            )));
        }

        let now = Utc::now();
        let sql = format!(
            "UPDATE users SET nick = $2, gender = $3, avatar_ref = $4, about = $5, \
             status = 'active', last_activity_time = $6 WHERE id = $1 RETURNING {USER_COLS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(&activation.nick)
            .bind(activation.gender.as_str())
            .bind(&activation.avatar_ref)
            .bind(&activation.about)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_write_err)?;

        append_log(
            &mut tx,
            AuditFamily::User,
            user_id,
            user_id,
            AuditAction::UserActivate,
            &row.status,
            Some(&row.role),
            json!({ "nick": activation.nick }),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_user()
    }

    async fn set_avatar(&self, user_id: Uuid, avatar_ref: &str) -> DomainResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let user = lock_user(&mut tx, user_id, true).await?;
        if !user.status.can_participate() {
            return Err(DomainError::precondition(format!(
                "user {user_id} may not edit their profile in {} status",
                user.status.as_str()
            )));
        }

        let now = Utc::now();
        let sql = format!(
            "UPDATE users SET avatar_ref = $2, last_activity_time = $3 WHERE id = $1 \
             RETURNING {USER_COLS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(avatar_ref)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::User,
            user_id,
            user_id,
            AuditAction::UserSetAvatar,
            &row.status,
            Some(&row.role),
            json!({}),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_user()
    }

    async fn set_about(&self, user_id: Uuid, about: &str) -> DomainResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let user = lock_user(&mut tx, user_id, true).await?;
        if !user.status.can_participate() {
            return Err(DomainError::precondition(format!(
                "user {user_id} may not edit their profile in {} status",
                user.status.as_str()
            )));
        }

        let now = Utc::now();
        let sql = format!(
            "UPDATE users SET about = $2, last_activity_time = $3 WHERE id = $1 \
             RETURNING {USER_COLS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(about)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::User,
            user_id,
            user_id,
            AuditAction::UserSetAbout,
            &row.status,
            Some(&row.role),
            json!({}),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_user()
    }

    async fn create_photo(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        media_ref: &str,
        description: &str,
    ) -> DomainResult<Photo> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let actor = lock_user(&mut tx, user_id, false).await?;
        if actor.status != UserStatus::Active {
            return Err(DomainError::precondition(format!(
                "user {user_id} is not active"
            )));
        }

        let sql = format!("SELECT {TOPIC_COLS} FROM topics WHERE id = $1 FOR SHARE");
        let topic = sqlx::query_as::<_, TopicRow>(&sql)
            .bind(topic_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(DomainError::NotFound("Topic", topic_id.to_string()))?
            .into_topic()?;
        if topic.status != TopicStatus::Available {
            return Err(DomainError::precondition(format!(
                "topic {topic_id} is not available"
            )));
        }

        let photo_id = Uuid::new_v4();
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO photos (id, user_id, topic_id, media_ref, description, status, \
             create_time) VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING {PHOTO_COLS}"
        );
        let row = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(photo_id)
            .bind(user_id)
            .bind(topic_id)
            .bind(media_ref)
            .bind(description)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::Photo,
            photo_id,
            user_id,
            AuditAction::PhotoCreate,
            &row.status,
            None,
            json!({ "topic_id": topic_id }),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_photo()
    }

    async fn set_photo_posted(
        &self,
        photo_id: Uuid,
        surface: PostSurface,
        posted: PostedMessage,
    ) -> DomainResult<Photo> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let photo = lock_photo(&mut tx, photo_id, true).await?;

        let columns = match surface {
            PostSurface::Moderation => ("moderation_chat_ref", "moderation_message_ref"),
            PostSurface::Channel => ("channel_chat_ref", "channel_message_ref"),
        };
        let now = Utc::now();
        let sql = format!(
            "UPDATE photos SET {} = $2, {} = $3 WHERE id = $1 RETURNING {PHOTO_COLS}",
            columns.0, columns.1
        );
        let row = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(photo_id)
            .bind(posted.chat_ref)
            .bind(posted.message_ref)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::Photo,
            photo_id,
            photo.user_id,
            AuditAction::PhotoPost,
            &row.status,
            None,
            json!({ "surface": surface, "chat_ref": posted.chat_ref }),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_photo()
    }

    async fn set_photo_status(
        &self,
        actor_id: Uuid,
        photo_id: Uuid,
        status: PhotoStatus,
    ) -> DomainResult<Photo> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let actor = lock_user(&mut tx, actor_id, false).await?;
        if !actor.role.can_moderate() {
            return Err(DomainError::precondition(format!(
                "user {actor_id} may not moderate photos"
            )));
        }

        let photo = lock_photo(&mut tx, photo_id, true).await?;
        if photo.status != PhotoStatus::Pending {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} is not pending"
            )));
        }
        let action = match status {
            PhotoStatus::Approved => AuditAction::PhotoApprove,
            PhotoStatus::Rejected => AuditAction::PhotoReject,
            PhotoStatus::Pending => {
                return Err(DomainError::precondition(
                    "a moderation decision cannot return a photo to pending",
                ))
            }
        };

        let now = Utc::now();
        let sql = format!("UPDATE photos SET status = $2 WHERE id = $1 RETURNING {PHOTO_COLS}");
        let row = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(photo_id)
            .bind(status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::Photo,
            photo_id,
            actor_id,
            action,
            &row.status,
            None,
            json!({}),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_photo()
    }

    async fn delete_photo(&self, user_id: Uuid, photo_id: Uuid) -> DomainResult<Photo> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let photo = lock_photo(&mut tx, photo_id, true).await?;
        if photo.user_id != user_id {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} does not belong to user {user_id}"
            )));
        }

        let now = Utc::now();
        let sql =
            format!("UPDATE photos SET status = 'rejected' WHERE id = $1 RETURNING {PHOTO_COLS}");
        let row = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(photo_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::Photo,
            photo_id,
            user_id,
            AuditAction::PhotoDelete,
            &row.status,
            None,
            json!({}),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_photo()
    }

    async fn create_rate(
        &self,
        user_id: Uuid,
        photo_id: Uuid,
        value: RateValue,
    ) -> DomainResult<Rate> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let photo = lock_photo(&mut tx, photo_id, false).await?;
        if photo.status != PhotoStatus::Approved {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} is not approved"
            )));
        }
        let already: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM rates WHERE user_id = $1 AND photo_id = $2")
                .bind(user_id)
                .bind(photo_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        if already.is_some() {
            return Err(DomainError::precondition(format!(
                "user {user_id} already rated photo {photo_id}"
            )));
        }

        let rate_id = Uuid::new_v4();
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO rates (id, user_id, topic_id, photo_id, value, create_time) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RATE_COLS}"
        );
        let row = sqlx::query_as::<_, RateRow>(&sql)
            .bind(rate_id)
            .bind(user_id)
            .bind(photo.topic_id)
            .bind(photo_id)
            .bind(value.as_i16())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_write_err)?;

        append_log(
            &mut tx,
            AuditFamily::Rate,
            rate_id,
            user_id,
            AuditAction::RateCreate,
            "created",
            None,
            json!({ "photo_id": photo_id, "value": value.as_i16() }),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_rate()
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        photo_id: Uuid,
        message_ref: i64,
        text: &str,
    ) -> DomainResult<Comment> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The actor row is locked for update: last_activity_time is bumped
        // in this same transaction.
        let actor = lock_user(&mut tx, user_id, true).await?;
        if actor.status != UserStatus::Active {
            return Err(DomainError::precondition(format!(
                "user {user_id} is not active"
            )));
        }

        let photo = lock_photo(&mut tx, photo_id, false).await?;
        if photo.status != PhotoStatus::Approved {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} is not approved"
            )));
        }

        let sql = format!("SELECT {TOPIC_COLS} FROM topics WHERE id = $1 FOR SHARE");
        let topic = sqlx::query_as::<_, TopicRow>(&sql)
            .bind(photo.topic_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(DomainError::NotFound("Topic", photo.topic_id.to_string()))?
            .into_topic()?;
        if topic.status != TopicStatus::Available {
            return Err(DomainError::precondition(format!(
                "topic {} is not available",
                topic.id
            )));
        }

        let comment_id = Uuid::new_v4();
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO comments (id, user_id, topic_id, photo_id, message_ref, status, text, \
             create_time) VALUES ($1, $2, $3, $4, $5, 'visible', $6, $7) RETURNING {COMMENT_COLS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(comment_id)
            .bind(user_id)
            .bind(photo.topic_id)
            .bind(photo_id)
            .bind(message_ref)
            .bind(text)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("UPDATE users SET last_activity_time = $2 WHERE id = $1")
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        append_log(
            &mut tx,
            AuditFamily::Comment,
            comment_id,
            user_id,
            AuditAction::CommentCreate,
            &row.status,
            None,
            json!({ "photo_id": photo_id }),
            now,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;
        row.into_comment()
    }

    // ── Read-only accessors ──────────────────────────────────────────────

    async fn get_user_by_external(&self, external_id: i64) -> DomainResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE external_id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn get_user_profile(&self, user_id: Uuid) -> DomainResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn is_nick_taken(&self, nick: &str) -> DomainResult<bool> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM users WHERE lower(nick) = lower($1)")
                .bind(nick)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(found.is_some())
    }

    async fn get_topics(&self) -> DomainResult<Vec<Topic>> {
        let sql = format!(
            "SELECT {TOPIC_COLS} FROM topics WHERE status = 'available' ORDER BY name"
        );
        let rows = sqlx::query_as::<_, TopicRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(TopicRow::into_topic).collect()
    }

    async fn get_topic(&self, topic_id: Uuid) -> DomainResult<Option<Topic>> {
        let sql = format!("SELECT {TOPIC_COLS} FROM topics WHERE id = $1");
        sqlx::query_as::<_, TopicRow>(&sql)
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(TopicRow::into_topic)
            .transpose()
    }

    async fn get_photos_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Photo>> {
        let sql = format!(
            "SELECT {PHOTO_COLS} FROM photos WHERE user_id = $1 AND status <> 'rejected' \
             ORDER BY create_time DESC"
        );
        let rows = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(PhotoRow::into_photo).collect()
    }

    async fn get_approved_photos(
        &self,
        topic_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> DomainResult<(Vec<Photo>, u32)> {
        if per_page == 0 {
            return Ok((Vec::new(), 0));
        }
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM photos WHERE topic_id = $1 AND status = 'approved'",
        )
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        let total_pages = ((total as u32) + per_page - 1) / per_page;
        if page == 0 {
            return Ok((Vec::new(), total_pages));
        }

        let sql = format!(
            "SELECT {PHOTO_COLS} FROM photos WHERE topic_id = $1 AND status = 'approved' \
             ORDER BY create_time DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(topic_id)
            .bind(per_page as i64)
            .bind(((page - 1) * per_page) as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let photos: DomainResult<Vec<Photo>> =
            rows.into_iter().map(PhotoRow::into_photo).collect();
        Ok((photos?, total_pages))
    }

    async fn search_by_nick(&self, fragment: &str) -> DomainResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLS} FROM users WHERE status IN ('active', 'penalty') \
             AND nick ILIKE '%' || $1 || '%' ORDER BY nick"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(fragment)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn rating_summary(&self, photo_id: Uuid) -> DomainResult<(u64, f64)> {
        let (count, avg): (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), AVG(value::float8) FROM rates WHERE photo_id = $1",
        )
        .bind(photo_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok((count as u64, avg.unwrap_or(0.0)))
    }

    async fn audit_trail(
        &self,
        family: AuditFamily,
        entity_id: Uuid,
    ) -> DomainResult<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT entity_id, actor_user_id, action, resulting_status, resulting_role, data, \
             created_at FROM {} WHERE entity_id = $1 ORDER BY id",
            log_table(family)
        );
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(AuditRow::into_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_row(status: &str, role: &str, gender: Option<&str>) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            external_id: 7,
            nick: Some("abcd_1".to_string()),
            gender: gender.map(str::to_string),
            status: status.to_string(),
            role: role.to_string(),
            avatar_ref: None,
            about: None,
            register_time: Utc::now(),
            last_activity_time: Utc::now(),
        }
    }

    fn photo_row(status: &str) -> PhotoRow {
        PhotoRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            moderation_chat_ref: None,
            moderation_message_ref: None,
            channel_chat_ref: None,
            channel_message_ref: None,
            media_ref: "file_abc".to_string(),
            description: "dunes at dawn".to_string(),
            status: status.to_string(),
            create_time: Utc::now(),
        }
    }

    #[test]
    fn user_row_decodes_known_enums() {
        let user = user_row("active", "moderator", Some("couple"))
            .into_user()
            .unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, UserRole::Moderator);
        assert_eq!(user.gender, Some(Gender::Couple));
    }

    #[test]
    fn unknown_status_fails_closed() {
        let err = user_row("banhammer", "user", None).into_user().unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");
    }

    #[test]
    fn unknown_role_fails_closed() {
        let err = user_row("active", "overlord", None).into_user().unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");
    }

    #[test]
    fn unknown_gender_fails_closed() {
        let err = user_row("active", "user", Some("unset"))
            .into_user()
            .unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");
    }

    #[test]
    fn unknown_photo_status_fails_closed() {
        let err = photo_row("limbo").into_photo().unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");
    }

    #[test]
    fn half_a_posted_message_pair_fails_closed() {
        let mut row = photo_row("approved");
        row.moderation_chat_ref = Some(-50);
        let err = row.into_photo().unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");

        let mut row = photo_row("approved");
        row.channel_message_ref = Some(777);
        assert!(row.into_photo().is_err());
    }

    #[test]
    fn full_posted_message_pair_decodes() {
        let mut row = photo_row("approved");
        row.moderation_chat_ref = Some(-50);
        row.moderation_message_ref = Some(777);
        let photo = row.into_photo().unwrap();
        assert_eq!(
            photo.moderation_post,
            Some(PostedMessage {
                chat_ref: -50,
                message_ref: 777
            })
        );
        assert_eq!(photo.channel_post, None);
    }
}
