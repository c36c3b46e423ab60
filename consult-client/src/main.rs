use clap::Parser;
use consult_client::{ConsultClient, Frame, play};
use consult_core::{AiProvider, ConsultationRequest, ConsultationTurn, Gender, PatientInfo};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const GENERIC_FAILURE: &str = "Sorry, I couldn't process your request right now. Please try again, or visit the nearest healthcare facility if your symptoms are severe.";

#[derive(Parser, Debug)]
#[command(
    name = "consult-client",
    about = "Chat with the AI doctor from your terminal"
)]
struct Args {
    /// Base URL of the consultation service
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8001")]
    backend_url: String,

    /// Continue an existing session instead of starting a new one
    #[arg(long)]
    session: Option<String>,

    #[arg(long)]
    age: Option<u8>,

    /// male, female or other
    #[arg(long)]
    gender: Option<Gender>,

    #[arg(long)]
    location: Option<String>,

    /// gemini or grok; the server default when omitted
    #[arg(long)]
    provider: Option<AiProvider>,

    /// Delay between revealed characters, 0 prints replies at once
    #[arg(long, default_value_t = 20)]
    reveal_ms: u64,
}

impl Args {
    fn patient_info(&self) -> Option<PatientInfo> {
        if self.age.is_none() && self.gender.is_none() && self.location.is_none() {
            return None;
        }
        Some(PatientInfo {
            age: self.age,
            gender: self.gender,
            location: self.location.clone().or(PatientInfo::default().location),
        })
    }
}

fn print_turn(turn: &ConsultationTurn) {
    println!(
        "[{}] You: {}",
        turn.timestamp.format("%Y-%m-%d %H:%M"),
        turn.patient_message
    );
    println!("Doctor: {}\n", turn.doctor_response);
}

fn prompt() {
    print!("You: ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = ConsultClient::new(&args.backend_url)?;
    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let patient_info = args.patient_info();
    let reveal_every = Duration::from_millis(args.reveal_ms);

    match client.health().await {
        Ok(health) => println!(
            "{} - database {}, AI {}",
            health.service, health.database, health.ai_service
        ),
        Err(e) => println!("Service unavailable at {} ({})", args.backend_url, e),
    }
    println!("Session: {session_id}");
    println!("Type your symptoms. /history lists this session, /quit exits.\n");

    for turn in client.history_or_empty(&session_id).await {
        print_turn(&turn);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        match message {
            "" => {}
            "/quit" | "/exit" => break,
            "/history" => {
                let turns = client.history_or_empty(&session_id).await;
                if turns.is_empty() {
                    println!("No consultations yet.\n");
                }
                turns.iter().for_each(print_turn);
            }
            _ => {
                let request = ConsultationRequest {
                    message: message.to_string(),
                    session_id: session_id.clone(),
                    patient_info: patient_info.clone(),
                    ai_provider: args.provider,
                };
                println!("Doctor is typing...");
                match client.consult(&request).await {
                    Ok(turn) => {
                        print!("Doctor: ");
                        play(&turn.doctor_response, reveal_every, |frame| {
                            let added = match frame {
                                Frame::Partial { added, .. } => added,
                                Frame::Committed { added, .. } => added,
                            };
                            print!("{added}");
                            let _ = std::io::stdout().flush();
                        })
                        .await;
                        println!("\n");
                    }
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Consultation failed");
                        println!("Doctor: {GENERIC_FAILURE}\n");
                    }
                }
            }
        }
        prompt();
    }

    Ok(())
}
