//! Ask command - answers one question and exits

use clap::Args;

use crate::api::types::QueryResponse;
use crate::config::AppConfig;
use crate::domain::Query;
use crate::infrastructure::logging;

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The medication question, e.g. "side effects of ibuprofen"
    pub question: String,

    /// Print the full answer (intent, sources, errors) as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let mut config = AppConfig::load()?;
    // Keep stdout for the answer unless RUST_LOG asks for more
    config.logging.level = "warn".to_string();
    logging::init_logging(&config.logging);

    let state = crate::create_app_state(&config).await?;
    let answer = state.orchestrator.answer(Query::new(question)).await;

    if args.json {
        let response = QueryResponse::from(answer);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", answer.response);
        for error in &answer.errors {
            eprintln!("warning: {}", error);
        }
    }

    Ok(())
}
