use chrono::{DateTime, Utc};
use futures_util::stream::{Stream, TryStreamExt};
use pollkeeper_models::poll::{option_display, AnswerInput, CreatePollInput, Poll};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection};
use sqlx::query::QueryAs;

use crate::lookup::{like_pattern, PollLookup};
use crate::{DbError, DbPool, RequestContext, UnitOfWork, ValidationError};

pub const POLL_PAGE_SIZE: i64 = 10;

/// One poll row joined with one of its options (none for option-less rows).
#[derive(Debug, Clone, sqlx::FromRow)]
struct PollOptionRow {
    id: i64,
    question: String,
    guild_id: String,
    author_id: String,
    is_multi: bool,
    duration: i16,
    created_at: DateTime<Utc>,
    answer: Option<String>,
    emoji: Option<String>,
}

/// Selects the polls matched by `$filter` (which may order and limit them)
/// together with their options, grouped by poll and in option order.
macro_rules! select_polls {
    ($filter:literal) => {
        concat!(
            "SELECT p.id, p.question, p.guild_id, p.author_id, p.is_multi, p.duration, p.created_at,
                    o.answer, o.emoji
             FROM (SELECT id, question, guild_id, author_id, is_multi, duration, created_at
                   FROM poll ",
            $filter,
            ") p
             LEFT JOIN poll_option o ON o.poll_id = p.id
             ORDER BY p.id, o.position"
        )
    };
}

type PollQuery<'q> = QueryAs<'q, Sqlite, PollOptionRow, SqliteArguments<'q>>;

pub async fn find_poll(
    pool: &DbPool,
    ctx: &RequestContext,
    guild_id: &str,
    lookup: PollLookup<'_>,
) -> Result<Poll, DbError> {
    let query: PollQuery<'_> = match lookup {
        PollLookup::ByIdAndTitle { id, title } => sqlx::query_as(select_polls!(
            "WHERE id = ?1 AND guild_id = ?2 AND question = ?3 LIMIT 1"
        ))
        .bind(id)
        .bind(guild_id)
        .bind(title),
        PollLookup::ById(id) => {
            sqlx::query_as(select_polls!("WHERE id = ?1 AND guild_id = ?2 LIMIT 1"))
                .bind(id)
                .bind(guild_id)
        }
        PollLookup::ByTitle(title) => sqlx::query_as(select_polls!(
            "WHERE guild_id = ?1 AND question LIKE ?2 ESCAPE '\\' ORDER BY id LIMIT 1"
        ))
        .bind(guild_id)
        .bind(like_pattern(title)),
        PollLookup::Missing => return Err(DbError::MissingKey),
    };

    tracing::debug!(?lookup, guild_id, "polls: lookup");
    fetch_polls(pool, ctx, query)
        .await?
        .into_iter()
        .next()
        .ok_or(DbError::NotFound)
}

/// One page of the polls in `guild_id` whose question contains `title`.
pub async fn find_all_polls(
    pool: &DbPool,
    ctx: &RequestContext,
    guild_id: &str,
    title: &str,
    page: u32,
) -> Result<Vec<Poll>, DbError> {
    if title.is_empty() {
        return Err(DbError::MissingKey);
    }

    let offset = i64::from(page) * POLL_PAGE_SIZE;
    let query: PollQuery<'_> = sqlx::query_as(select_polls!(
        "WHERE guild_id = ?1 AND question LIKE ?2 ESCAPE '\\' ORDER BY id LIMIT ?3 OFFSET ?4"
    ))
    .bind(guild_id)
    .bind(like_pattern(title))
    .bind(POLL_PAGE_SIZE)
    .bind(offset);

    tracing::debug!(guild_id, title, page, "polls: listing");
    fetch_polls(pool, ctx, query).await
}

/// Whether `guild_id` already holds a poll asking exactly `question`.
pub async fn poll_exists(
    pool: &DbPool,
    ctx: &RequestContext,
    guild_id: &str,
    question: &str,
) -> Result<bool, DbError> {
    ctx.run(
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM poll WHERE guild_id = ?1 AND question = ?2)",
        )
        .bind(guild_id)
        .bind(question)
        .fetch_one(pool),
    )
    .await
}

/// Stores a poll and all of its options atomically and returns the new id.
pub async fn create_poll(
    pool: &DbPool,
    ctx: &RequestContext,
    input: &CreatePollInput,
) -> Result<i64, DbError> {
    validate_input(input)?;

    let mut uow = UnitOfWork::begin(pool, ctx).await?;
    let result = insert_poll_with_options(ctx, uow.conn(), input).await;
    let poll_id = uow.finish(result).await?;

    tracing::info!(
        poll_id,
        guild_id = %input.guild_id,
        answers = input.answers.len(),
        "polls: created"
    );
    Ok(poll_id)
}

/// Removes a poll and its options. The caller is responsible for scoping.
pub async fn delete_poll(pool: &DbPool, ctx: &RequestContext, id: i64) -> Result<(), DbError> {
    let mut uow = UnitOfWork::begin(pool, ctx).await?;
    let result = delete_poll_rows(ctx, uow.conn(), id).await;
    uow.finish(result).await?;

    tracing::info!(poll_id = id, "polls: deleted");
    Ok(())
}

fn validate_input(input: &CreatePollInput) -> Result<(), ValidationError> {
    if input.guild_id.is_empty() {
        return Err(ValidationError::EmptyScope);
    }
    if input.question.is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    if input.duration <= 0 {
        return Err(ValidationError::NonPositiveDuration(input.duration));
    }
    if input.answers.is_empty() {
        return Err(ValidationError::NoAnswers);
    }
    Ok(())
}

async fn insert_poll_with_options(
    ctx: &RequestContext,
    conn: &mut SqliteConnection,
    input: &CreatePollInput,
) -> Result<i64, DbError> {
    let poll_id = insert_poll_row(ctx, conn, input).await?;
    insert_options(ctx, conn, poll_id, &input.answers).await?;
    Ok(poll_id)
}

async fn insert_poll_row(
    ctx: &RequestContext,
    conn: &mut SqliteConnection,
    input: &CreatePollInput,
) -> Result<i64, DbError> {
    ctx.run(
        sqlx::query_scalar(
            "INSERT INTO poll (question, guild_id, author_id, is_multi, duration)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
        )
        .bind(input.question.as_str())
        .bind(input.guild_id.as_str())
        .bind(input.author_id.as_str())
        .bind(input.is_multi)
        .bind(input.duration)
        .fetch_one(&mut *conn),
    )
    .await
}

/// Inserts answers in order; the request is re-checked before each one.
async fn insert_options<'a>(
    ctx: &RequestContext,
    conn: &mut SqliteConnection,
    poll_id: i64,
    answers: impl IntoIterator<Item = &'a AnswerInput>,
) -> Result<(), DbError> {
    for (position, answer) in answers.into_iter().enumerate() {
        if answer.text.is_empty() {
            return Err(ValidationError::EmptyAnswer { position }.into());
        }

        ctx.run(
            sqlx::query(
                "INSERT INTO poll_option (poll_id, position, answer, emoji)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(poll_id)
            .bind(position as i64)
            .bind(answer.text.as_str())
            .bind(answer.emoji())
            .execute(&mut *conn),
        )
        .await?;
    }
    Ok(())
}

async fn delete_poll_rows(
    ctx: &RequestContext,
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<(), DbError> {
    let options = ctx
        .run(
            sqlx::query("DELETE FROM poll_option WHERE poll_id = ?1")
                .bind(id)
                .execute(&mut *conn),
        )
        .await;
    if matches!(&options, Err(err) if err.is_interrupted()) {
        return options.map(|_| ());
    }

    let poll = ctx
        .run(
            sqlx::query("DELETE FROM poll WHERE id = ?1")
                .bind(id)
                .execute(&mut *conn),
        )
        .await;

    let mut errors = Vec::new();
    if let Err(err) = options {
        errors.push(err);
    }
    match poll {
        Err(err) => errors.push(err),
        Ok(done) if errors.is_empty() && done.rows_affected() == 0 => {
            return Err(DbError::NotFound);
        }
        Ok(_) => {}
    }

    match DbError::join(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Streams joined rows, checking the request before each one.
async fn fetch_polls(
    pool: &DbPool,
    ctx: &RequestContext,
    query: PollQuery<'_>,
) -> Result<Vec<Poll>, DbError> {
    collect_polls(ctx, query.fetch(pool)).await
}

async fn collect_polls<S>(ctx: &RequestContext, mut rows: S) -> Result<Vec<Poll>, DbError>
where
    S: Stream<Item = Result<PollOptionRow, sqlx::Error>> + Unpin,
{
    let mut polls: Vec<Poll> = Vec::new();
    while let Some(row) = ctx.run(rows.try_next()).await? {
        push_row(&mut polls, row);
    }
    Ok(polls)
}

fn push_row(polls: &mut Vec<Poll>, row: PollOptionRow) {
    let option = row
        .answer
        .as_deref()
        .map(|answer| option_display(row.emoji.as_deref(), answer));

    match polls.last_mut() {
        Some(poll) if poll.id == row.id => poll.options.extend(option),
        _ => polls.push(Poll {
            id: row.id,
            question: row.question,
            guild_id: row.guild_id,
            author_id: row.author_id,
            is_multi: row.is_multi,
            duration: row.duration,
            created_at: row.created_at,
            options: option.into_iter().collect(),
        }),
    }
}
