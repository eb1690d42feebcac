//! Loominary voice client
//!
//! Uploads notes, keeps the per-course cache and runs spoken quiz and doubt
//! sessions against a Loominary server, using the terminal as the voice
//! device.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loominary_agent::{
    ChatPoller, CourseCache, FileCourseStore, SpeechAdapter, StudyClient, TerminalSpeech,
    VoiceSession, VoiceSessionEvent,
};
use loominary_config::{load_settings, Settings};
use loominary_core::{
    CourseStore, DocumentAnalysis, InteractionMode, SpeechRecognizer, SpeechSynthesizer,
};

/// Cache key of the saved session token
const TOKEN_KEY: &str = "loominary_session_token";

#[derive(Parser, Debug)]
#[command(name = "loominary-voice", version, about = "Study your notes out loud")]
struct Cli {
    /// Server URL (overrides client.base_url)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Log at the configured level instead of warnings only
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and remember the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Analyze notes and add them to a course
    Analyze {
        #[arg(long)]
        course: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List a course's analyzed documents
    Documents {
        #[arg(long)]
        course: String,
    },
    /// Remove one document from a course
    Remove {
        #[arg(long)]
        course: String,
        #[arg(long)]
        file: String,
    },
    /// Forget a course's documents and mistakes
    Reset {
        #[arg(long)]
        course: String,
    },
    /// Show the recent mistakes of a course
    Mistakes {
        #[arg(long)]
        course: String,
    },
    /// Spoken quiz over a document
    Quiz {
        #[arg(long)]
        course: String,
        /// Document file name; defaults to the first one
        #[arg(long)]
        file: Option<String>,
    },
    /// Ask questions about a document
    Doubt {
        #[arg(long)]
        course: String,
        #[arg(long)]
        file: Option<String>,
    },
    /// Course chat
    Chat {
        #[arg(long)]
        course: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = std::env::var("LOOMINARY_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };
    init_tracing(&settings, cli.verbose);

    let store = Arc::new(
        FileCourseStore::open(&settings.client.data_dir)
            .with_context(|| format!("opening {}", settings.client.data_dir.display()))?,
    );
    let cache = CourseCache::new(store.clone());

    let base_url = cli.server.as_deref().unwrap_or(&settings.client.base_url);
    let mut client = StudyClient::new(base_url)?;
    if let Some(token) = store.get(TOKEN_KEY)? {
        client = client.with_token(token);
    }
    let client = Arc::new(client);

    match cli.command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let user = client.register(&name, &email, &password).await?;
            println!("Registered {}", user.name.as_deref().unwrap_or(&user.email));
        },
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            store.set(TOKEN_KEY, &session.token)?;
            println!(
                "Logged in as {}",
                session.user.name.as_deref().unwrap_or(&session.user.email)
            );
        },
        Command::Analyze { course, files } => {
            let upload = client.analyze(&files).await?;
            for doc in &upload.documents {
                println!("{}\n  {}", doc.file_name, doc.summary);
                for (i, question) in doc.questions.iter().enumerate() {
                    println!("  {}. {}", i + 1, question);
                }
            }
            let all = cache.append_documents(&course, upload)?;
            println!("{} now has {} document(s)", course, all.documents.len());
        },
        Command::Documents { course } => match cache.load_analysis(&course)? {
            Some(analysis) => {
                for doc in &analysis.documents {
                    println!("{} ({} questions)", doc.file_name, doc.questions.len());
                    for pitfall in &doc.mistakes {
                        println!("  ! {} -> {}", pitfall.pitfall, pitfall.correction);
                    }
                }
            },
            None => println!("No documents for {}", course),
        },
        Command::Remove { course, file } => match cache.remove_document(&course, &file)? {
            Some(left) => println!("{} document(s) left", left.documents.len()),
            None => println!("{} has no documents left", course),
        },
        Command::Reset { course } => {
            cache.reset(&course)?;
            println!("Cleared {}", course);
        },
        Command::Mistakes { course } => {
            let recent = cache.load_mistakes(&course)?;
            if recent.is_empty() {
                println!("No mistakes recorded yet");
            }
            for mistake in recent.iter() {
                println!("- {}", mistake);
            }
        },
        Command::Quiz { course, file } => {
            let document = pick_document(&cache, &course, file.as_deref())?;
            run_voice(&settings, client, cache, &course, document, InteractionMode::Quiz).await?;
        },
        Command::Doubt { course, file } => {
            let document = pick_document(&cache, &course, file.as_deref())?;
            run_voice(&settings, client, cache, &course, document, InteractionMode::Doubt).await?;
        },
        Command::Chat { course } => run_chat(&settings, client, &course).await?,
    }

    Ok(())
}

fn pick_document(
    cache: &CourseCache,
    course: &str,
    file: Option<&str>,
) -> anyhow::Result<DocumentAnalysis> {
    let analysis = cache
        .load_analysis(course)?
        .ok_or_else(|| anyhow!("No documents for {}; run `analyze` first", course))?;

    let document = match file {
        Some(name) => analysis.find(name).cloned(),
        None => analysis.documents.first().cloned(),
    };
    document.ok_or_else(|| anyhow!("Document not found in {}", course))
}

async fn run_voice(
    settings: &Settings,
    client: Arc<StudyClient>,
    cache: CourseCache,
    course: &str,
    document: DocumentAnalysis,
    mode: InteractionMode,
) -> anyhow::Result<()> {
    let terminal = Arc::new(TerminalSpeech::stdio(Duration::from_secs(
        settings.client.listen_timeout_secs,
    )));
    let speech = Arc::new(SpeechAdapter::new(
        Some(terminal.clone() as Arc<dyn SpeechSynthesizer>),
        Some(terminal as Arc<dyn SpeechRecognizer>),
    ));
    let session = Arc::new(VoiceSession::new(speech, client).with_course_cache(cache, course)?);

    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                VoiceSessionEvent::Feedback(analysis) => {
                    println!("  [{}] {}", analysis.status.as_str(), analysis.feedback);
                    for suggestion in &analysis.suggestions {
                        println!("  tip: {}", suggestion);
                    }
                },
                VoiceSessionEvent::MistakesUpdated(list) => {
                    println!("  recent mistakes: {}", list.len());
                },
                VoiceSessionEvent::Error(message) => eprintln!("Error: {}", message),
                VoiceSessionEvent::Ended { reason } => {
                    tracing::info!(%reason, "Session over");
                    break;
                },
                _ => {},
            }
        }
    });

    println!("Ctrl+C ends the session.");
    let interrupt = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.end();
            }
        })
    };

    let outcome = match mode {
        InteractionMode::Quiz => session.start_quiz(&document).await,
        InteractionMode::Doubt => session.start_doubt(&document).await,
    };
    interrupt.abort();
    let _ = printer.await;

    if let Err(e) = outcome {
        if e.is_unauthorized() {
            bail!("Not logged in; run `login` first");
        }
        return Err(e.into());
    }
    Ok(())
}

async fn run_chat(settings: &Settings, client: Arc<StudyClient>, course: &str) -> anyhow::Result<()> {
    if client.token().is_none() {
        bail!("Not logged in; run `login` first");
    }

    let poller = ChatPoller::new(
        client,
        course,
        Duration::from_millis(settings.chat.poll_interval_ms),
    );
    poller.refresh().await?;

    let mut updates = poller.subscribe();
    let printer = tokio::spawn(async move {
        let mut shown = 0usize;
        loop {
            {
                let messages = updates.borrow_and_update();
                // History only grows from the end within one window
                if messages.len() < shown {
                    shown = 0;
                }
                for message in messages.iter().skip(shown) {
                    let author = message
                        .user
                        .name
                        .as_deref()
                        .or(message.user.email.as_deref())
                        .unwrap_or("someone");
                    println!(
                        "[{}] {}: {}",
                        message.created_at.format("%H:%M"),
                        author,
                        message.content
                    );
                }
                shown = messages.len();
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    });
    let polling = poller.start();

    println!("Type a message and press Enter; Ctrl+D leaves the chat.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    if let Err(e) = poller.send(&line).await {
                        eprintln!("Error: {}", e);
                    }
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.stop();
    let _ = polling.await;
    printer.abort();
    Ok(())
}

/// Logs go to stderr so they don't interleave with the conversation
fn init_tracing(config: &Settings, verbose: bool) {
    let level = if verbose {
        config.observability.log_level.as_str()
    } else {
        "warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("loominary={}", level).into());

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
