//! Interactive search prompt.

use inquire::error::InquireError;

use crate::record::SearchHit;
use crate::semantic::{ranking, SemanticSearchService};

const PROMPT: &str = "What are you looking for? (type 'exit' to quit):";
const SEPARATOR_WIDTH: usize = 40;
pub const NO_RESULTS: &str = "No results found or an error occurred.";

#[derive(Debug, PartialEq, Eq)]
pub enum ShellInput {
    Exit,
    Empty,
    Query(String),
}

pub fn parse_input(line: &str) -> ShellInput {
    let line = line.trim();
    if line.is_empty() {
        ShellInput::Empty
    } else if line.eq_ignore_ascii_case("exit") {
        ShellInput::Exit
    } else {
        ShellInput::Query(line.to_string())
    }
}

/// Results as pretty JSON blocks, each followed by a dashed rule.
/// Expects hits already ranked.
pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }

    let rule = "-".repeat(SEPARATOR_WIDTH);
    let mut out = String::from("\nSearch Results:\n");
    for shown in ranking::present(hits) {
        let json = serde_json::to_string_pretty(&shown).unwrap_or_default();
        out.push_str(&json);
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
    }
    out
}

/// Prompt until the user types `exit` or closes the prompt.
pub fn run(service: &SemanticSearchService, k: usize) -> anyhow::Result<()> {
    println!("Welcome to semsearch!");

    loop {
        let line = match inquire::Text::new(PROMPT).prompt() {
            Ok(line) => line,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => anyhow::bail!("An error occurred: {}", err),
        };

        match parse_input(&line) {
            ShellInput::Exit => break,
            ShellInput::Empty => {
                println!("Please enter a non-empty search query.");
            }
            ShellInput::Query(query) => {
                let hits = service.search_ranked(&query, k);
                println!("{}", render_hits(&hits));
            }
        }
    }

    println!("Exiting the search system. Goodbye!");
    Ok(())
}
