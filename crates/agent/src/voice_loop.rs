//! Voice loop orchestrator
//!
//! Drives one Socratic session over a document:
//!
//! ```text
//! speak(prompt) ──▶ listen() ──▶ turn client ──▶ speak(spokenResponse) ──▶ ...
//!                     │
//!                     └─ nothing heard ──▶ speak(clarification) ──▶ ...
//! ```
//!
//! Turns are strictly sequential. Every suspension point is followed by a
//! check of the run's active flag, so ending a session stops all further
//! speech and discards the result of a turn request still in flight.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use loominary_core::{
    DocumentAnalysis, InteractionMode, RecentMistakes, TurnAnalysis, TurnRequest, TurnResult,
};

use crate::course_cache::CourseCache;
use crate::speech::SpeechAdapter;
use crate::AgentError;

/// Submits one student utterance for evaluation
#[async_trait]
pub trait TurnClient: Send + Sync {
    async fn submit_turn(&self, request: &TurnRequest) -> Result<TurnResult, AgentError>;
}

/// Voice session events
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSessionEvent {
    Started {
        file_name: String,
        mode: InteractionMode,
    },
    /// Prompt about to be spoken
    Prompt(String),
    /// What the student said
    Transcript(String),
    /// A turn request is in flight
    Processing(bool),
    Feedback(TurnAnalysis),
    MistakesUpdated(Vec<String>),
    /// Surfaced error; the session has ended
    Error(String),
    Ended {
        reason: String,
    },
}

/// Opening line of a doubt session
pub fn doubt_welcome(file_name: &str) -> String {
    format!(
        "I'm ready to clear your doubts about \"{}\". What would you like to know?",
        file_name
    )
}

/// Voice session for one student
pub struct VoiceSession {
    speech: Arc<SpeechAdapter>,
    turns: Arc<dyn TurnClient>,
    course: Option<(CourseCache, String)>,
    /// Flag of the current run; replaced on every start
    active: Mutex<Arc<AtomicBool>>,
    mistakes: Mutex<RecentMistakes>,
    last_analysis: RwLock<Option<TurnAnalysis>>,
    event_tx: broadcast::Sender<VoiceSessionEvent>,
}

impl VoiceSession {
    pub fn new(speech: Arc<SpeechAdapter>, turns: Arc<dyn TurnClient>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            speech,
            turns,
            course: None,
            active: Mutex::new(Arc::new(AtomicBool::new(false))),
            mistakes: Mutex::new(RecentMistakes::default()),
            last_analysis: RwLock::new(None),
            event_tx,
        }
    }

    /// Persist mistakes for `course_id` through the cache
    pub fn with_course_cache(
        mut self,
        cache: CourseCache,
        course_id: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let course_id = course_id.into();
        *self.mistakes.get_mut() = cache.load_mistakes(&course_id)?;
        self.course = Some((cache, course_id));
        Ok(self)
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<VoiceSessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().load(Ordering::SeqCst)
    }

    /// Feedback of the most recent completed turn
    pub fn last_analysis(&self) -> Option<TurnAnalysis> {
        self.last_analysis.read().clone()
    }

    pub fn mistakes(&self) -> RecentMistakes {
        self.mistakes.lock().clone()
    }

    pub fn speech(&self) -> &Arc<SpeechAdapter> {
        &self.speech
    }

    /// Quiz the student, opening with the document's first question
    pub async fn start_quiz(&self, document: &DocumentAnalysis) -> Result<(), AgentError> {
        let first = document.voice_config.first_question.clone();
        self.run(first, document, InteractionMode::Quiz).await
    }

    /// Answer the student's doubts about the document
    pub async fn start_doubt(&self, document: &DocumentAnalysis) -> Result<(), AgentError> {
        let welcome = doubt_welcome(&document.file_name);
        self.run(welcome, document, InteractionMode::Doubt).await
    }

    /// End the session: speech is aborted and in-flight results discarded
    pub fn end(&self) {
        let was_active = self.active.lock().swap(false, Ordering::SeqCst);
        self.speech.abort();
        if was_active {
            tracing::info!("Voice session ended");
            self.emit(VoiceSessionEvent::Ended {
                reason: "ended".to_string(),
            });
        }
    }

    /// Run the loop until the session is ended or fails.
    ///
    /// Returns `Ok` when the session stopped quietly (ended, aborted) and the
    /// surfaced error otherwise.
    pub async fn run(
        &self,
        first_prompt: String,
        document: &DocumentAnalysis,
        mode: InteractionMode,
    ) -> Result<(), AgentError> {
        let active = {
            let mut current = self.active.lock();
            // A previous run, if any, must not continue alongside this one
            current.store(false, Ordering::SeqCst);
            let fresh = Arc::new(AtomicBool::new(true));
            *current = fresh.clone();
            fresh
        };
        *self.last_analysis.write() = None;

        tracing::info!(file = %document.file_name, %mode, "Voice session started");
        self.emit(VoiceSessionEvent::Started {
            file_name: document.file_name.clone(),
            mode,
        });

        let is_active = || active.load(Ordering::SeqCst);
        let mut prompt = first_prompt;

        loop {
            if !is_active() {
                return Ok(());
            }

            self.emit(VoiceSessionEvent::Prompt(prompt.clone()));
            self.speech.speak(&prompt).await;

            if !is_active() {
                return Ok(());
            }

            let transcript = match self.speech.listen().await {
                Ok(transcript) => transcript,
                Err(e) if e.is_benign() => {
                    if active.swap(false, Ordering::SeqCst) {
                        self.emit(VoiceSessionEvent::Ended {
                            reason: "aborted".to_string(),
                        });
                    }
                    return Ok(());
                },
                Err(e) => {
                    if !active.swap(false, Ordering::SeqCst) {
                        return Ok(());
                    }
                    tracing::warn!(error = %e, "Voice loop stopped by recognition error");
                    return Err(self.fail(AgentError::Speech(e)));
                },
            };

            if !is_active() {
                return Ok(());
            }

            if transcript.trim().is_empty() {
                tracing::debug!("No answer detected, re-prompting");
                prompt = mode.clarification().to_string();
                continue;
            }

            self.emit(VoiceSessionEvent::Transcript(transcript.clone()));

            let request = TurnRequest {
                user_answer: transcript,
                current_question: prompt.clone(),
                document_summary: document.summary.clone(),
                file_name: document.file_name.clone(),
                mode,
            };

            self.emit(VoiceSessionEvent::Processing(true));
            let outcome = self.turns.submit_turn(&request).await;
            self.emit(VoiceSessionEvent::Processing(false));

            if !is_active() {
                tracing::debug!("Discarding turn result of an ended session");
                return Ok(());
            }

            match outcome {
                Ok(result) => {
                    self.apply_feedback(result.analysis);
                    prompt = result.spoken_response;
                },
                Err(e) => {
                    active.store(false, Ordering::SeqCst);
                    tracing::error!(error = %e, "Turn request failed");
                    return Err(self.fail(e));
                },
            }
        }
    }

    fn apply_feedback(&self, analysis: TurnAnalysis) {
        if !analysis.mistakes.is_empty() {
            self.record_mistakes(&analysis.mistakes);
        }
        *self.last_analysis.write() = Some(analysis.clone());
        self.emit(VoiceSessionEvent::Feedback(analysis));
    }

    fn record_mistakes(&self, reported: &[String]) {
        let updated = match &self.course {
            Some((cache, course_id)) => match cache.record_mistakes(course_id, reported) {
                Ok(recent) => {
                    let changed = *self.mistakes.lock() != recent;
                    *self.mistakes.lock() = recent;
                    changed
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to persist mistakes");
                    self.mistakes.lock().merge(reported)
                },
            },
            None => self.mistakes.lock().merge(reported),
        };

        if updated {
            let list = self.mistakes.lock().to_vec();
            self.emit(VoiceSessionEvent::MistakesUpdated(list));
        }
    }

    fn fail(&self, error: AgentError) -> AgentError {
        self.emit(VoiceSessionEvent::Error(error.to_string()));
        self.emit(VoiceSessionEvent::Ended {
            reason: "error".to_string(),
        });
        error
    }

    fn emit(&self, event: VoiceSessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::testing::{RecordingSynth, Scripted, ScriptedRecognizer};
    use crate::speech::ListenError;
    use loominary_core::{
        AnswerStatus, InMemoryCourseStore, Pitfall, RecognitionError, VoiceConfig,
    };
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    fn document() -> DocumentAnalysis {
        DocumentAnalysis {
            file_name: "cells.pdf".to_string(),
            summary: "Cells are the unit of life.".to_string(),
            questions: vec!["What is a cell?".to_string()],
            mistakes: vec![Pitfall::new("p", "c")],
            voice_config: VoiceConfig {
                system_prompt: "tutor".to_string(),
                first_question: "What is a cell?".to_string(),
            },
        }
    }

    fn result(spoken: &str, mistakes: &[&str]) -> TurnResult {
        TurnResult {
            spoken_response: spoken.to_string(),
            analysis: TurnAnalysis {
                status: AnswerStatus::Partial,
                feedback: "ok".to_string(),
                mistakes: mistakes.iter().map(|m| m.to_string()).collect(),
                suggestions: Vec::new(),
            },
        }
    }

    /// Replays results and records requests
    #[derive(Default)]
    struct ScriptedTurns {
        replies: SyncMutex<VecDeque<Result<TurnResult, AgentError>>>,
        requests: SyncMutex<Vec<TurnRequest>>,
    }

    impl ScriptedTurns {
        fn new(replies: Vec<Result<TurnResult, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: SyncMutex::new(replies.into()),
                requests: SyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TurnClient for ScriptedTurns {
        async fn submit_turn(&self, request: &TurnRequest) -> Result<TurnResult, AgentError> {
            self.requests.lock().push(request.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Turn("script exhausted".to_string())))
        }
    }

    struct Harness {
        session: Arc<VoiceSession>,
        synth: Arc<RecordingSynth>,
    }

    fn harness(script: Vec<Scripted>, turns: Arc<dyn TurnClient>) -> Harness {
        let synth = Arc::new(RecordingSynth::default());
        let speech = Arc::new(SpeechAdapter::new(
            Some(synth.clone()),
            Some(Arc::new(ScriptedRecognizer::new(script))),
        ));
        Harness {
            session: Arc::new(VoiceSession::new(speech, turns)),
            synth,
        }
    }

    fn heard(text: &str) -> Scripted {
        Ok(Some(text.to_string()))
    }

    #[tokio::test]
    async fn test_empty_transcript_reprompts_without_turn_call() {
        let turns = ScriptedTurns::new(vec![]);
        let h = harness(
            vec![Ok(Some(String::new())), Err(RecognitionError::NoSpeech)],
            turns.clone(),
        );

        // Script runs out on the third listen, which blocks until aborted
        let session = h.session.clone();
        let run = tokio::spawn(async move { session.start_quiz(&document()).await });

        let mut events = h.session.subscribe();
        let mut prompts = 0;
        while prompts < 3 {
            if let Ok(VoiceSessionEvent::Prompt(_)) = events.recv().await {
                prompts += 1;
            }
        }
        h.session.end();
        run.await.unwrap().unwrap();

        let spoken = h.synth.spoken.lock().clone();
        assert_eq!(spoken[0], "What is a cell?");
        assert_eq!(spoken[1], InteractionMode::Quiz.clarification());
        assert_eq!(spoken[2], InteractionMode::Quiz.clarification());
        assert!(turns.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_turns_chain_and_mistakes_merge() {
        let turns = ScriptedTurns::new(vec![
            Ok(result("Good. What about organelles?", &["confused cell wall"])),
            Ok(result("Nice. Next?", &["confused cell wall", "forgot nucleus"])),
            Err(AgentError::Turn("Failed to process quiz response".to_string())),
        ]);
        let store = Arc::new(InMemoryCourseStore::new());
        let cache = CourseCache::new(store);

        let synth = Arc::new(RecordingSynth::default());
        let speech = Arc::new(SpeechAdapter::new(
            Some(synth.clone()),
            Some(Arc::new(ScriptedRecognizer::new(vec![
                heard("a membrane bag"),
                heard("they do things"),
                heard("no idea"),
            ]))),
        ));
        let session = VoiceSession::new(speech, turns.clone())
            .with_course_cache(cache.clone(), "bio")
            .unwrap();

        let err = session.start_quiz(&document()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to process quiz response"));
        assert!(!session.is_active());

        let requests = turns.requests.lock().clone();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].current_question, "What is a cell?");
        assert_eq!(requests[0].user_answer, "a membrane bag");
        assert_eq!(requests[0].document_summary, "Cells are the unit of life.");
        assert_eq!(requests[1].current_question, "Good. What about organelles?");
        assert_eq!(requests[2].current_question, "Nice. Next?");

        assert_eq!(
            session.mistakes().to_vec(),
            vec!["confused cell wall", "forgot nucleus"]
        );
        assert_eq!(cache.load_mistakes("bio").unwrap().len(), 2);
        assert_eq!(session.last_analysis().unwrap().feedback, "ok");
        assert_eq!(synth.spoken.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_recognition_error_surfaces_and_terminates() {
        let turns = ScriptedTurns::new(vec![]);
        let h = harness(vec![Err(RecognitionError::AudioCapture)], turns.clone());
        let mut events = h.session.subscribe();

        let err = h.session.start_doubt(&document()).await.unwrap_err();
        assert!(matches!(err, AgentError::Speech(ListenError::AudioCapture)));
        assert!(!h.session.is_active());
        assert!(turns.requests.lock().is_empty());

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let VoiceSessionEvent::Error(msg) = event {
                assert!(msg.starts_with("Microphone capture failed"));
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert_eq!(
            h.synth.spoken.lock()[0],
            "I'm ready to clear your doubts about \"cells.pdf\". What would you like to know?"
        );
    }

    #[tokio::test]
    async fn test_abort_is_silent() {
        let h = harness(vec![Err(RecognitionError::Aborted)], ScriptedTurns::new(vec![]));
        let mut events = h.session.subscribe();

        h.session.start_quiz(&document()).await.unwrap();
        assert!(!h.session.is_active());

        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, VoiceSessionEvent::Error(_)));
        }
    }

    /// Blocks until released, then answers
    struct GatedTurns {
        entered: Notify,
        release: Notify,
        calls: SyncMutex<usize>,
    }

    #[async_trait]
    impl TurnClient for GatedTurns {
        async fn submit_turn(&self, _request: &TurnRequest) -> Result<TurnResult, AgentError> {
            *self.calls.lock() += 1;
            self.entered.notify_one();
            self.release.notified().await;
            Ok(result("This must never be spoken", &["late mistake"]))
        }
    }

    #[tokio::test]
    async fn test_end_discards_in_flight_turn() {
        let turns = Arc::new(GatedTurns {
            entered: Notify::new(),
            release: Notify::new(),
            calls: SyncMutex::new(0),
        });
        let h = harness(vec![heard("mitochondria")], turns.clone());

        let session = h.session.clone();
        let run = tokio::spawn(async move { session.start_quiz(&document()).await });

        turns.entered.notified().await;
        h.session.end();
        turns.release.notify_one();

        run.await.unwrap().unwrap();

        assert_eq!(*turns.calls.lock(), 1);
        assert_eq!(*h.synth.spoken.lock(), vec!["What is a cell?"]);
        assert!(h.session.last_analysis().is_none());
        assert!(h.session.mistakes().is_empty());
    }
}
