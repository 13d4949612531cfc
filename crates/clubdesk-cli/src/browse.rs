//! Interactive club browser.
//!
//! Reads commands line by line. Search text goes through the debounced
//! filter state, so rapid edits only issue a request once typing pauses.
//! Every change of the effective parameters resubscribes the listing;
//! revisiting a page within the cache grace period is served from cache.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use clubdesk_core::models::ClubPage;
use clubdesk_core::{FilterState, Query, StudentApi};

use crate::commands::print_club_table;

const HELP: &str = "\
Commands:
  <text>        search (applied after you pause)
  f <id>        filter by faculty id (empty to clear)
  c <id>        filter by category id (empty to clear)
  n / p         next / previous page
  g <n>         go to page n
  a <id>        apply to a club
  r             reload
  x             clear filters and search
  h             this help
  q             quit";

/// One parsed input line.
#[derive(Debug, PartialEq)]
enum Input {
    Search(String),
    Faculty(String),
    Category(String),
    Next,
    Prev,
    Page(u32),
    Apply(String),
    Reload,
    Clear,
    Help,
    Quit,
    Invalid(String),
}

fn parse(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word {
        "q" if rest.is_empty() => Input::Quit,
        "h" if rest.is_empty() => Input::Help,
        "n" if rest.is_empty() => Input::Next,
        "p" if rest.is_empty() => Input::Prev,
        "r" if rest.is_empty() => Input::Reload,
        "x" if rest.is_empty() => Input::Clear,
        "f" => Input::Faculty(rest.to_string()),
        "c" => Input::Category(rest.to_string()),
        "a" if !rest.is_empty() => Input::Apply(rest.to_string()),
        "g" => match rest.parse() {
            Ok(page) => Input::Page(page),
            Err(_) => Input::Invalid(format!("not a page number: {}", rest)),
        },
        _ => Input::Search(line.trim().to_string()),
    }
}

fn render(filters: &FilterState, query: &Query<ClubPage>) {
    let state = query.state();
    let header = filters.params().canonical();

    if state.is_loading() && state.data.is_none() {
        println!("[{}] loading...", header);
        return;
    }

    if let Some(ref page) = state.data {
        println!();
        print_club_table(&page.clubs);
        println!(
            "[{}] page {} of {}{}",
            header,
            filters.page(),
            page.pagination.pages(),
            if state.is_loading() { " (refreshing)" } else { "" }
        );
    }
    if let Some(ref error) = state.error {
        println!("[{}] error: {}", header, error);
    }
}

pub(crate) async fn run(api: &StudentApi) -> Result<()> {
    println!("{}", HELP);

    let mut filters = FilterState::clubs();
    let mut query = api.clubs(filters.params());
    let mut revision = filters.revision();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    render(&filters, &query);

    loop {
        let deadline = filters.deadline();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse(&line) {
                    Input::Quit => break,
                    Input::Help => println!("{}", HELP),
                    Input::Search(text) => filters.set_search(&text),
                    Input::Faculty(id) => filters.set_filter("facultyId", id),
                    Input::Category(id) => filters.set_filter("categoryId", id),
                    Input::Next => filters.next_page(),
                    Input::Prev => filters.prev_page(),
                    Input::Page(page) => filters.set_page(page),
                    Input::Clear => filters.clear(),
                    Input::Reload => {
                        query.refetch();
                    }
                    Input::Apply(id) => match api.apply(&id).await {
                        Ok(envelope) => println!(
                            "{}",
                            envelope.message.unwrap_or_else(|| "Application submitted.".to_string())
                        ),
                        Err(e) if e.is_auth_failure() => return Err(e.into()),
                        Err(e) => println!("error: {}", e),
                    },
                    Input::Invalid(message) => println!("{}", message),
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                filters.tick();
            }
            state = query.changed() => {
                if let Some(ref error) = state.error {
                    if error.is_auth_failure() {
                        return Err(error.clone().into());
                    }
                }
                render(&filters, &query);
            }
        }

        if filters.revision() != revision {
            revision = filters.revision();
            debug!(params = %filters.params().canonical(), "Resubscribing club listing");
            query = api.clubs(filters.params());
            render(&filters, &query);
        }
    }

    Ok(())
}
