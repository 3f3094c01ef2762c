use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::TurnError;
use crate::models::{ChatTurn, Citation, PipelineResult};
use crate::pipeline::RagPipeline;
use crate::transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellState {
    Idle,
    AwaitingInput,
    ProcessingQuery,
    RenderingResult,
    Halted,
}

/// What the screen shows for one answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl From<&PipelineResult> for RenderedAnswer {
    fn from(result: &PipelineResult) -> Self {
        Self {
            answer: result.answer.clone(),
            citations: result.cited_chunks.iter().map(Citation::from).collect(),
        }
    }
}

/// One user's chat session: its transcript plus where it is in the
/// question/answer cycle. `turn` serializes questions; `conversation` is only
/// locked briefly, so state and transcript stay readable mid-turn.
#[derive(Debug)]
pub struct Shell {
    id: Uuid,
    turn: Mutex<()>,
    conversation: RwLock<Conversation>,
}

#[derive(Debug)]
struct Conversation {
    transcript: Transcript,
    state: ShellState,
}

impl Shell {
    pub fn new(max_turns: usize, halted: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            turn: Mutex::new(()),
            conversation: RwLock::new(Conversation {
                transcript: Transcript::new(max_turns),
                state: if halted { ShellState::Halted } else { ShellState::Idle },
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn state(&self) -> ShellState {
        self.conversation.read().await.state
    }

    pub async fn turns(&self) -> Vec<ChatTurn> {
        self.conversation.read().await.transcript.all()
    }

    /// Snapshot for the screen. Once drawn, an idle shell is waiting for
    /// the next question.
    pub async fn render(&self) -> (ShellState, Vec<ChatTurn>) {
        let mut conversation = self.conversation.write().await;
        if conversation.state == ShellState::Idle {
            conversation.state = ShellState::AwaitingInput;
        }
        (conversation.state, conversation.transcript.all())
    }

    /// Runs one question through the pipeline. The user turn is always
    /// recorded; the assistant turn only when an answer was produced.
    /// `question` must already be non-blank.
    pub async fn submit(
        &self,
        question: &str,
        pipeline: Option<&RagPipeline>,
    ) -> Result<RenderedAnswer, TurnError> {
        let _turn = self.turn.lock().await;

        let halted = {
            let mut conversation = self.conversation.write().await;
            conversation.transcript.append(ChatTurn::user(question));
            conversation.state == ShellState::Halted
        };

        let pipeline = match pipeline {
            Some(pipeline) if !halted => pipeline,
            _ => {
                warn!(session = %self.id, "Question arrived without an initialized pipeline");
                self.settle().await;
                return Err(TurnError::UninitializedPipeline);
            }
        };

        self.set_state(ShellState::ProcessingQuery).await;
        let result = match pipeline.answer(question).await {
            Ok(result) => result,
            Err(err) => {
                warn!(session = %self.id, kind = ?err.kind(), "Turn failed: {}", err);
                self.settle().await;
                return Err(err);
            }
        };

        self.set_state(ShellState::RenderingResult).await;
        let rendered = RenderedAnswer::from(&result);

        let turns = {
            let mut conversation = self.conversation.write().await;
            conversation.transcript.append(ChatTurn::assistant(result.answer));
            conversation.state = ShellState::Idle;
            conversation.transcript.len()
        };
        info!(session = %self.id, turns, "Turn answered");
        Ok(rendered)
    }

    async fn set_state(&self, state: ShellState) {
        self.conversation.write().await.state = state;
    }

    async fn settle(&self) {
        let mut conversation = self.conversation.write().await;
        if conversation.state != ShellState::Halted {
            conversation.state = ShellState::Idle;
        }
    }
}

pub type SharedShell = Arc<Shell>;

/// Live sessions, keyed by id. The oldest session is evicted once
/// `max_sessions` is reached.
pub struct SessionStore {
    inner: RwLock<Sessions>,
    max_sessions: usize,
    max_turns: usize,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, SharedShell>,
    order: VecDeque<Uuid>,
}

impl SessionStore {
    pub fn new(max_sessions: usize, max_turns: usize) -> Self {
        Self {
            inner: RwLock::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
            max_turns,
        }
    }

    pub async fn create(&self, halted: bool) -> Uuid {
        let shell = Shell::new(self.max_turns, halted);
        let id = shell.id();

        let mut sessions = self.inner.write().await;
        while sessions.order.len() >= self.max_sessions {
            if let Some(oldest) = sessions.order.pop_front() {
                sessions.by_id.remove(&oldest);
                info!(session = %oldest, "Evicted oldest session");
            }
        }
        sessions.order.push_back(id);
        sessions.by_id.insert(id, Arc::new(shell));
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedShell> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }
}
