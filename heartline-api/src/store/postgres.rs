use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::{not, sql};
use diesel::pg::PgConnection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::prelude::*;
use diesel::sql_types::{Array, Double, Integer, Text};
use diesel::upsert::excluded;
use uuid::Uuid;

use heartline_shared::clients::DbPool;
use heartline_shared::errors::{AppError, AppResult, ErrorCode};

use crate::domain::geo::GeoPoint;
use crate::domain::graph::{self, PairAction, PairEdge, PairKey, PairState, Transition};
use crate::models::{
    Credential, Message, NewCredential, NewMessage, NewPair, NewUser, PairRow, ProfileUpdate, User,
    PAIR_MATCHED, PAIR_PENDING,
};
use crate::schema::{credentials, messages, pairs, users};
use crate::store::{DeletedUser, PhotoAppend, Store};

#[derive(QueryableByName)]
struct PhotosRow {
    #[diesel(sql_type = Array<Text>)]
    photos: Vec<String>,
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run blocking diesel work on the blocking pool with a pooled connection.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| AppError::internal(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("database task failed: {e}")))?
    }
}

fn load_user(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<User>> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

/// A pair row referencing a user deleted mid-transaction.
fn missing_user(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            AppError::new(ErrorCode::UserNotFound, "user not found")
        }
        other => other.into(),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        self.with_conn(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn provision_user(&self, subject: &str, email: Option<&str>) -> AppResult<(User, bool)> {
        let subject = subject.to_string();
        let email = email.map(str::to_string);
        self.with_conn(move |conn| {
            let new_user = NewUser {
                id: Uuid::now_v7(),
                subject: &subject,
                email: email.as_deref(),
            };
            // Concurrent first contacts race on the unique subject; the
            // loser reads the winner's row.
            let inserted = diesel::insert_into(users::table)
                .values(&new_user)
                .on_conflict(users::subject)
                .do_nothing()
                .returning(User::as_returning())
                .get_result(conn)
                .optional()?;

            match inserted {
                Some(user) => Ok((user, true)),
                None => {
                    let user = users::table
                        .filter(users::subject.eq(&subject))
                        .select(User::as_select())
                        .first(conn)?;
                    Ok((user, false))
                }
            }
        })
        .await
    }

    async fn user_by_subject(&self, subject: &str) -> AppResult<Option<User>> {
        let subject = subject.to_string();
        self.with_conn(move |conn| {
            let user = users::table
                .filter(users::subject.eq(subject))
                .select(User::as_select())
                .first(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn user(&self, id: Uuid) -> AppResult<Option<User>> {
        self.with_conn(move |conn| Ok(load_user(conn, id)?)).await
    }

    async fn users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let found = users::table
                .filter(users::id.eq_any(ids))
                .select(User::as_select())
                .load(conn)?;
            Ok(found)
        })
        .await
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<Option<DeletedUser>> {
        self.with_conn(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let messages_removed = diesel::delete(
                    messages::table.filter(messages::sender_id.eq(id).or(messages::recipient_id.eq(id))),
                )
                .execute(conn)?;

                // Pair rows go with the user through ON DELETE CASCADE.
                let user = diesel::delete(users::table.find(id))
                    .returning(User::as_returning())
                    .get_result(conn)
                    .optional()?;

                Ok(user.map(|user| DeletedUser { user, messages_removed }))
            })
        })
        .await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> AppResult<Option<User>> {
        let update = update.clone();
        self.with_conn(move |conn| {
            if update.is_empty() {
                return Ok(load_user(conn, id)?);
            }
            let user = diesel::update(users::table.find(id))
                .set((&update, users::updated_at.eq(Utc::now())))
                .returning(User::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn set_position(&self, id: Uuid, position: GeoPoint, label: Option<&str>) -> AppResult<Option<User>> {
        let label = label.map(str::to_string);
        self.with_conn(move |conn| {
            let target = users::table.find(id);
            let coordinates = (
                users::latitude.eq(Some(position.latitude)),
                users::longitude.eq(Some(position.longitude)),
                users::updated_at.eq(Utc::now()),
            );
            let user = match label {
                Some(label) => diesel::update(target)
                    .set((coordinates, users::location_label.eq(Some(label))))
                    .returning(User::as_returning())
                    .get_result(conn)
                    .optional()?,
                None => diesel::update(target)
                    .set(coordinates)
                    .returning(User::as_returning())
                    .get_result(conn)
                    .optional()?,
            };
            Ok(user)
        })
        .await
    }

    async fn append_photos(&self, id: Uuid, refs: &[String], max: usize) -> AppResult<PhotoAppend> {
        let refs = refs.to_vec();
        let max = i32::try_from(max).map_err(|_| AppError::internal("photo limit out of range"))?;
        self.with_conn(move |conn| {
            let appended = diesel::sql_query(
                "UPDATE users SET photos = photos || $1, updated_at = now() \
                 WHERE id = $2 AND cardinality(photos) + cardinality($1::text[]) <= $3 \
                 RETURNING photos",
            )
            .bind::<Array<Text>, _>(refs)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Integer, _>(max)
            .get_result::<PhotosRow>(conn)
            .optional()?;

            if let Some(row) = appended {
                return Ok(PhotoAppend::Appended(row.photos));
            }

            let current = users::table
                .find(id)
                .select(users::photos)
                .first::<Vec<String>>(conn)
                .optional()?;
            Ok(match current {
                Some(photos) => PhotoAppend::LimitExceeded { current: photos.len() },
                None => PhotoAppend::UserMissing,
            })
        })
        .await
    }

    async fn remove_photo(&self, id: Uuid, reference: &str) -> AppResult<Option<Vec<String>>> {
        let reference = reference.to_string();
        self.with_conn(move |conn| {
            let row = diesel::sql_query(
                "UPDATE users SET photos = array_remove(photos, $1), updated_at = now() \
                 WHERE id = $2 AND $1 = ANY(photos) \
                 RETURNING photos",
            )
            .bind::<Text, _>(reference)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .get_result::<PhotosRow>(conn)
            .optional()?;
            Ok(row.map(|r| r.photos))
        })
        .await
    }

    async fn replace_photo_order(&self, id: Uuid, order: &[String]) -> AppResult<Option<Vec<String>>> {
        let order = order.to_vec();
        self.with_conn(move |conn| {
            // Same elements, same count: with no duplicates stored, a permutation.
            let row = diesel::sql_query(
                "UPDATE users SET photos = $1, updated_at = now() \
                 WHERE id = $2 AND photos @> $1 AND photos <@ $1 \
                 AND cardinality(photos) = cardinality($1::text[]) \
                 RETURNING photos",
            )
            .bind::<Array<Text>, _>(order)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .get_result::<PhotosRow>(conn)
            .optional()?;
            Ok(row.map(|r| r.photos))
        })
        .await
    }

    async fn pair_state(&self, key: PairKey) -> AppResult<PairState> {
        self.with_conn(move |conn| {
            let row = pairs::table
                .find((key.low(), key.high()))
                .select(PairRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(|r| r.pair_state()).unwrap_or(PairState::None))
        })
        .await
    }

    async fn apply_pair_action(&self, key: PairKey, action: PairAction) -> AppResult<Transition> {
        self.with_conn(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                // Serialises every action on this pair, including the very
                // first one when no row exists yet to lock.
                diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                    .bind::<Text, _>(key.room_id())
                    .execute(conn)?;

                let row = pairs::table
                    .find((key.low(), key.high()))
                    .select(PairRow::as_select())
                    .first(conn)
                    .optional()?;
                let from = row.as_ref().map(PairRow::pair_state).unwrap_or(PairState::None);
                let to = graph::apply(&key, from, action)?;

                let (state, matched_at) = match to {
                    PairState::None => return Ok(Transition { from, to }),
                    PairState::PendingFrom(_) => (PAIR_PENDING, None),
                    PairState::Matched => (PAIR_MATCHED, Some(Utc::now())),
                };
                let initiator = match (to, &row) {
                    (PairState::PendingFrom(initiator), _) => initiator,
                    (_, Some(existing)) => existing.initiator,
                    _ => action.actor(),
                };

                diesel::insert_into(pairs::table)
                    .values(&NewPair {
                        user_low: key.low(),
                        user_high: key.high(),
                        state,
                        initiator,
                        matched_at,
                    })
                    .on_conflict((pairs::user_low, pairs::user_high))
                    .do_update()
                    .set((
                        pairs::state.eq(excluded(pairs::state)),
                        pairs::matched_at.eq(excluded(pairs::matched_at)),
                    ))
                    .execute(conn)
                    .map_err(missing_user)?;

                Ok(Transition { from, to })
            })
        })
        .await
    }

    async fn edges(&self, user: Uuid) -> AppResult<Vec<PairEdge>> {
        self.with_conn(move |conn| {
            let rows = pairs::table
                .filter(pairs::user_low.eq(user).or(pairs::user_high.eq(user)))
                .select(PairRow::as_select())
                .load(conn)?;
            Ok(rows.iter().filter_map(|r| r.edge_for(user)).collect())
        })
        .await
    }

    async fn nearest_candidates(&self, viewer: &User, origin: GeoPoint, limit: usize) -> AppResult<Vec<User>> {
        let viewer_id = viewer.id;
        let viewer_gender = viewer.gender.clone();
        let accepted = (!viewer.orientation.is_empty()).then(|| viewer.orientation.clone());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let related_low = pairs::table
                .filter(pairs::user_high.eq(viewer_id))
                .select(pairs::user_low);
            let related_high = pairs::table
                .filter(pairs::user_low.eq(viewer_id))
                .select(pairs::user_high);

            let mut query = users::table
                .filter(users::id.ne(viewer_id))
                .filter(users::latitude.is_not_null())
                .filter(users::longitude.is_not_null())
                .filter(not(users::id.eq_any(related_low)))
                .filter(not(users::id.eq_any(related_high)))
                .select(User::as_select())
                .into_boxed();

            // Both sides must accept the other; an empty orientation accepts anyone.
            if let Some(accepted) = accepted {
                query = query
                    .filter(users::gender.is_not_null())
                    .filter(users::gender.assume_not_null().eq_any(accepted));
            }
            let open = users::orientation.eq(Vec::<String>::new());
            query = match viewer_gender {
                Some(gender) => query.filter(open.or(users::orientation.contains(vec![gender]))),
                None => query.filter(open),
            };

            // KNN over the GiST index on ll_to_earth(latitude, longitude).
            let distance = sql::<Double>("ll_to_earth(latitude, longitude) <-> ll_to_earth(")
                .bind::<Double, _>(origin.latitude)
                .sql(", ")
                .bind::<Double, _>(origin.longitude)
                .sql(")");

            let found = query.order(distance).limit(limit).load(conn)?;
            Ok(found)
        })
        .await
    }

    async fn insert_message(&self, message: NewMessage) -> AppResult<Message> {
        self.with_conn(move |conn| {
            let saved = diesel::insert_into(messages::table)
                .values(&message)
                .returning(Message::as_returning())
                .get_result(conn)?;
            Ok(saved)
        })
        .await
    }

    async fn conversation(&self, room_id: &str) -> AppResult<Vec<Message>> {
        let room_id = room_id.to_string();
        self.with_conn(move |conn| {
            let history = messages::table
                .filter(messages::room_id.eq(room_id))
                .order((messages::created_at.asc(), messages::seq.asc()))
                .select(Message::as_select())
                .load(conn)?;
            Ok(history)
        })
        .await
    }

    async fn latest_messages(&self, room_ids: &[String]) -> AppResult<Vec<Message>> {
        if room_ids.is_empty() {
            return Ok(Vec::new());
        }
        let room_ids = room_ids.to_vec();
        self.with_conn(move |conn| {
            let latest = messages::table
                .filter(messages::room_id.eq_any(room_ids))
                .distinct_on(messages::room_id)
                .order((messages::room_id, messages::created_at.desc(), messages::seq.desc()))
                .select(Message::as_select())
                .load(conn)?;
            Ok(latest)
        })
        .await
    }

    async fn create_credential(&self, credential: NewCredential) -> AppResult<Option<Credential>> {
        self.with_conn(move |conn| {
            let created = diesel::insert_into(credentials::table)
                .values(&credential)
                .on_conflict(credentials::email)
                .do_nothing()
                .returning(Credential::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(created)
        })
        .await
    }

    async fn credential_by_email(&self, email: &str) -> AppResult<Option<Credential>> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let found = credentials::table
                .filter(credentials::email.eq(email))
                .select(Credential::as_select())
                .first(conn)
                .optional()?;
            Ok(found)
        })
        .await
    }
}
