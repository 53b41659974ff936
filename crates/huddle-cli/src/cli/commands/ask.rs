//! Ask command handler.

use anyhow::{Context, Result};
use huddle_core::ask::{AskError, Asker, LEAGUE_PARAM};
use huddle_core::client::{ClientConfig, RoutingParams};
use huddle_core::config::{Config, Transport};
use huddle_core::events::{UpdateSender, create_update_channel};
use huddle_core::interrupt;
use huddle_core::session::Session;
use tokio_util::sync::CancellationToken;

use crate::render;

#[derive(clap::Args, Debug, Clone)]
pub struct AskArgs {
    /// The question to ask
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// League (context) identifier; overrides `league_id` from config
    #[arg(long, value_name = "ID")]
    pub league: Option<String>,

    /// Transport to use (stream, json); overrides config
    #[arg(long, value_name = "TRANSPORT")]
    pub transport: Option<Transport>,

    /// Agent base URL; overrides config and HUDDLE_BASE_URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Extra routing parameter (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Print the final session as JSON instead of streaming text
    #[arg(long)]
    pub json: bool,
}

impl AskArgs {
    fn routing_params(&self) -> RoutingParams {
        let mut params: RoutingParams = self.params.iter().cloned().collect();
        if let Some(league) = self.league.as_deref().map(str::trim)
            && !league.is_empty()
        {
            params.insert(LEAGUE_PARAM.to_string(), league.to_string());
        }
        params
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got '{raw}'"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn build_asker(args: &AskArgs, config: &Config) -> Result<Asker> {
    let endpoints = ClientConfig::from_config_with_base_url(config, args.base_url.as_deref())?;
    let asker = Asker::with_endpoints(endpoints, config).context("create client")?;
    Ok(match args.transport {
        Some(transport) => asker.with_transport(transport),
        None => asker,
    })
}

pub async fn run(args: AskArgs, config: &Config) -> Result<()> {
    let asker = build_asker(&args, config)?;
    let params = args.routing_params();

    let cancel = CancellationToken::new();
    let watcher = interrupt::cancel_on_interrupt(cancel.clone());

    let (sender, renderer) = if args.json {
        (UpdateSender::disabled(), None)
    } else {
        let (tx, rx) = create_update_channel();
        (UpdateSender::new(tx), Some(render::spawn_renderer_task(rx)))
    };

    let result = asker.ask(&args.question, params, &sender, &cancel).await;

    // Closing the channel lets the renderer drain and exit.
    drop(sender);
    if let Some(renderer) = renderer {
        let _ = renderer.await;
    }
    cancel.cancel();
    let _ = watcher.await;

    match result {
        Ok(session) => {
            if args.json {
                print_summary(&session)?;
            }
            Ok(())
        }
        Err(AskError::InvalidInput) => Err(AskError::InvalidInput.into()),
        Err(err) => {
            if args.json
                && let AskError::Failed { session, .. } = &err
            {
                print_summary(session)?;
            }
            if err.is_cancelled() {
                return Err(interrupt::InterruptedError.into());
            }
            Err(err.into())
        }
    }
}

fn print_summary(session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(&session.summary()).context("serialize session")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(question: &str) -> AskArgs {
        AskArgs {
            question: question.to_string(),
            league: None,
            transport: None,
            base_url: None,
            params: Vec::new(),
            json: false,
        }
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("week=7").unwrap(),
            ("week".to_string(), "7".to_string())
        );
        assert_eq!(
            parse_param("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_param("week").is_err());
        assert!(parse_param("=7").is_err());
    }

    #[test]
    fn test_league_flag_wins_over_param() {
        let mut args = args("q");
        args.params = vec![
            ("league_id".to_string(), "1".to_string()),
            ("week".to_string(), "7".to_string()),
        ];
        args.league = Some("2".to_string());

        let params = args.routing_params();
        assert_eq!(params.get("league_id").map(String::as_str), Some("2"));
        assert_eq!(params.get("week").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_base_url_flag_overrides_config() {
        let mut args = args("q");
        args.base_url = Some("http://agent.local:9000/".to_string());
        args.transport = Some(Transport::Json);

        let asker = build_asker(&args, &Config::default()).unwrap();
        assert_eq!(asker.transport(), Transport::Json);
        assert_eq!(asker.endpoints().base_url, "http://agent.local:9000");
    }

    #[test]
    fn test_invalid_base_url_flag_is_rejected() {
        let mut args = args("q");
        args.base_url = Some("not a url".to_string());
        assert!(build_asker(&args, &Config::default()).is_err());
    }
}
