use std::error::Error;

use clinic::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  login <email> <password> [role]   sign in
  logout                            sign out
  whoami                            show the session
  go <path>                         navigate (e.g. go /dashboard)
  menu                              routes you may open
  dash | sales                      show a filtered view
  filter <dash|sales> <name> <val>  change a filter (region, district, timeFilter, range)
  reset <dash|sales>                clear filters
  reload <dash|sales>               fetch again
  patients | pharmacy               list records
  top | lowstock                    sales reports
  quit";

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// One of the console's filtered views.
enum View<'a> {
    Dashboard(&'a ViewFetcher),
    Sales(&'a SalesFetcher),
}

impl<'a> View<'a> {
    fn named(console: &'a Console, name: &str) -> Option<Self> {
        match name {
            "dash" | "dashboard" => Some(Self::Dashboard(console.dashboard())),
            "sales" => Some(Self::Sales(console.sales())),
            _ => None,
        }
    }

    fn show(&self) {
        match self {
            Self::Dashboard(fetcher) => show(&fetcher.state()),
            Self::Sales(fetcher) => show(&fetcher.state()),
        }
    }

    fn set_param(&self, name: &str, value: &str) -> bool {
        match self {
            Self::Dashboard(fetcher) => fetcher.set_param(name, value),
            Self::Sales(fetcher) => fetcher.set_param(name, value),
        }
    }

    fn reset(&self) {
        match self {
            Self::Dashboard(fetcher) => fetcher.reset_params(),
            Self::Sales(fetcher) => fetcher.reset_params(),
        };
    }

    fn reload(&self) -> Result<u64, ApiError> {
        match self {
            Self::Dashboard(fetcher) => fetcher.reload(),
            Self::Sales(fetcher) => fetcher.reload(),
        }
    }
}

fn show<T: Serialize>(state: &FetchState<T>) {
    if state.loading {
        println!("loading (request #{})", state.generation);
    }
    match (&state.data, state.error_message()) {
        (_, Some(message)) => println!("error: {message}"),
        (Some(data), None) => match serde_json::to_string_pretty(data) {
            Ok(text) => println!("{text}"),
            Err(e) => println!("unprintable data: {e}"),
        },
        (None, None) => println!("no data yet"),
    }
}

async fn run(console: &Console, words: &[&str]) -> Result<bool, ClinicError> {
    match words {
        ["quit" | "exit"] => return Ok(false),
        ["help"] => println!("{HELP}"),
        ["login", email, password, rest @ ..] => {
            let mut credentials = Credentials::new(*email, *password);
            if let Some(role) = rest.first() {
                credentials = credentials.with_role(*role);
            }
            let session = console.sign_in(&credentials).await?;
            println!(
                "signed in as {} until {}",
                session.identity.role, session.expires_at
            );
        }
        ["logout"] => console.sign_out(),
        ["whoami"] => match console.state() {
            AuthState::Authenticated(session) => println!(
                "{} (expires {})",
                session.identity.role, session.expires_at
            ),
            other => println!("{other:?}"),
        },
        ["go", path] => match console.navigate(path) {
            Navigation::Redirect { to } => println!("redirected to {to}"),
            other => println!("{other:?}"),
        },
        ["menu"] => {
            for route in console.gate().visible_routes() {
                let label = route.label.unwrap_or_default();
                println!("{:<20} {}", label, route.path);
            }
        }
        [name] if View::named(console, name).is_some() => {
            if let Some(view) = View::named(console, name) {
                view.show();
            }
        }
        ["filter", name, key, value] => match View::named(console, name) {
            Some(view) => {
                if !view.set_param(key, value) {
                    println!("unchanged");
                }
            }
            None => println!("unknown view {name}"),
        },
        ["reset", name] => {
            if let Some(view) = View::named(console, name) {
                view.reset();
            }
        }
        ["reload", name] => {
            if let Some(view) = View::named(console, name) {
                view.reload()?;
            }
        }
        ["patients"] => {
            let patients = console.patients();
            let list: Value = console
                .authorized(|token| async move { patients.list(&token).await })
                .await?;
            println!("{list}");
        }
        ["pharmacy"] => {
            let pharmacy = console.pharmacy();
            let list: Value = console
                .authorized(|token| async move { pharmacy.list(&token).await })
                .await?;
            println!("{list}");
        }
        ["top"] => {
            let sales = console.sales_api();
            let top: Value = console
                .authorized(|token| async move { sales.top_selling(&token).await })
                .await?;
            println!("{top}");
        }
        ["lowstock"] => {
            let sales = console.sales_api();
            let low: Value = console
                .authorized(|token| async move { sales.low_stock(&token).await })
                .await?;
            println!("{low}");
        }
        [] => {}
        _ => println!("unknown command, try `help`"),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConsoleConfig::from_env();
    tracing::info!(base_url = %config.api.base_url, "starting clinic console");
    let console = Console::builder().config(config).build().await?;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match run(&console, &words).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {e}"),
        }
    }
    Ok(())
}
