use anyhow::{Context, Result};
use chrono::Utc;
use pollkeeper_db::{polls, Database, DbError, PollLookup, RequestContext};
use pollkeeper_models::poll::{
    duration_hours_until, normalize_duration_hours, AnswerInput, CreatePollInput,
};
use serde_json::{json, Value};

use crate::cli::{Command, CreateArgs, DetailsArgs, ListArgs, RemoveArgs};

/// Runs one command and returns what should be printed for it.
pub async fn execute(db: &Database, ctx: &RequestContext, command: Command) -> Result<Value> {
    match command {
        Command::Migrate => {
            db.migrate().await.context("failed to apply migrations")?;
            Ok(json!({ "migrated": true }))
        }
        Command::Check => {
            db.ping(ctx).await?;
            Ok(json!({ "reachable": true }))
        }
        Command::Create(args) => create(db, ctx, args).await,
        Command::Details(args) => details(db, ctx, args).await,
        Command::List(args) => list(db, ctx, args).await,
        Command::Remove(args) => remove(db, ctx, args).await,
    }
}

pub fn create_input(args: &CreateArgs) -> CreatePollInput {
    let duration = match args.expires_at {
        Some(expiry) => duration_hours_until(expiry, Utc::now()),
        None => normalize_duration_hours(args.hours.unwrap_or(0)),
    };

    CreatePollInput {
        question: args.question.clone(),
        guild_id: args.guild.clone(),
        author_id: args.author.clone(),
        duration,
        is_multi: args.multi,
        answers: args.answers.iter().map(|raw| AnswerInput::parse(raw)).collect(),
    }
}

async fn create(db: &Database, ctx: &RequestContext, args: CreateArgs) -> Result<Value> {
    if args.skip_existing && polls::poll_exists(db.pool(), ctx, &args.guild, &args.question).await? {
        tracing::info!(poll_name = %args.question, guild_id = %args.guild, "poll already stored, skipping");
        return Ok(json!({ "skipped": true, "question": args.question }));
    }

    let input = create_input(&args);
    let poll_id = polls::create_poll(db.pool(), ctx, &input)
        .await
        .with_context(|| format!("failed create a new poll {:?}", input.question))?;

    Ok(json!({ "id": poll_id, "duration": input.duration }))
}

async fn details(db: &Database, ctx: &RequestContext, args: DetailsArgs) -> Result<Value> {
    let lookup = PollLookup::from_options(args.id, args.title.as_deref());
    let poll = polls::find_poll(db.pool(), ctx, &args.guild, lookup)
        .await
        .map_err(|err| describe_lookup_error(err, args.id, args.title.as_deref()))?;

    tracing::info!(poll_id = poll.id, poll_question = %poll.question, "poll found");
    Ok(serde_json::to_value(poll)?)
}

async fn list(db: &Database, ctx: &RequestContext, args: ListArgs) -> Result<Value> {
    let found = polls::find_all_polls(db.pool(), ctx, &args.guild, &args.title, args.page).await?;
    tracing::info!(count = found.len(), page = args.page, "polls listed");
    Ok(serde_json::to_value(found)?)
}

/// Deletion itself is unscoped, so the poll is resolved in the guild first.
async fn remove(db: &Database, ctx: &RequestContext, args: RemoveArgs) -> Result<Value> {
    let poll = polls::find_poll(db.pool(), ctx, &args.guild, PollLookup::ById(args.id))
        .await
        .map_err(|err| describe_lookup_error(err, Some(args.id), None))?;

    polls::delete_poll(db.pool(), ctx, poll.id).await?;
    Ok(json!({ "removed": poll.id }))
}

fn describe_lookup_error(err: DbError, id: Option<i64>, title: Option<&str>) -> anyhow::Error {
    if err.is_not_found() {
        let id = id.map(|id| id.to_string()).unwrap_or_default();
        let title = title.unwrap_or_default();
        anyhow::Error::new(err).context(format!("poll with id {id:?} or title {title:?} not found"))
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_db() -> Database {
        let pool = pollkeeper_db::create_pool("sqlite::memory:", 1).await.unwrap();
        pollkeeper_db::run_migrations(&pool).await.unwrap();
        Database::from_pool(pool)
    }

    fn create_args(question: &str) -> CreateArgs {
        CreateArgs {
            guild: "guild-1".to_string(),
            author: "user-9".to_string(),
            question: question.to_string(),
            answers: vec!["🍕:Pizza".to_string(), "Tacos".to_string()],
            hours: None,
            expires_at: None,
            multi: false,
            skip_existing: true,
        }
    }

    #[test]
    fn create_input_normalizes_duration() {
        assert_eq!(create_input(&create_args("q")).duration, 24);

        let mut args = create_args("q");
        args.hours = Some(-5);
        assert_eq!(create_input(&args).duration, 24);

        args.hours = None;
        args.expires_at = Some(Utc::now() + Duration::minutes(90));
        assert_eq!(create_input(&args).duration, 2);
    }

    #[test]
    fn create_input_parses_answers() {
        let input = create_input(&create_args("q"));
        assert_eq!(input.answers[0], AnswerInput::new("🍕", "Pizza"));
        assert_eq!(input.answers[1], AnswerInput::new("", "Tacos"));
    }

    #[tokio::test]
    async fn create_details_list_remove_flow() {
        let db = test_db().await;
        let ctx = RequestContext::new();

        let created = execute(&db, &ctx, Command::Create(create_args("Pizza or Tacos?")))
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["duration"], 24);

        let skipped = execute(&db, &ctx, Command::Create(create_args("Pizza or Tacos?")))
            .await
            .unwrap();
        assert_eq!(skipped["skipped"], true);

        let shown = execute(
            &db,
            &ctx,
            Command::Details(DetailsArgs {
                guild: "guild-1".to_string(),
                id: None,
                title: Some("Tacos".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(shown["id"], id);
        assert_eq!(shown["options"], json!(["🍕 Pizza", "Tacos"]));

        let listed = execute(
            &db,
            &ctx,
            Command::List(ListArgs {
                guild: "guild-1".to_string(),
                title: "Pizza".to_string(),
                page: 0,
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let removed = execute(
            &db,
            &ctx,
            Command::Remove(RemoveArgs {
                guild: "guild-1".to_string(),
                id,
            }),
        )
        .await
        .unwrap();
        assert_eq!(removed["removed"], id);
    }

    #[tokio::test]
    async fn remove_refuses_other_guilds_poll() {
        let db = test_db().await;
        let ctx = RequestContext::new();
        let created = execute(&db, &ctx, Command::Create(create_args("Ours")))
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();

        let err = execute(
            &db,
            &ctx,
            Command::Remove(RemoveArgs {
                guild: "guild-2".to_string(),
                id,
            }),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let still_there = polls::find_poll(db.pool(), &ctx, "guild-1", PollLookup::ById(id)).await;
        assert!(still_there.is_ok());
    }

    #[tokio::test]
    async fn details_without_key_is_missing_key() {
        let db = test_db().await;
        let err = execute(
            &db,
            &RequestContext::new(),
            Command::Details(DetailsArgs {
                guild: "guild-1".to_string(),
                id: None,
                title: None,
            }),
        )
        .await
        .unwrap_err();
        let db_err = err.downcast_ref::<DbError>().unwrap();
        assert!(matches!(db_err, DbError::MissingKey));
    }
}
