//! Async driver for a [`SprintBoard`].
//!
//! The runtime is the board's event loop. It waits on four sources (store
//! snapshots, UI events, mutation results and the deadline ticker) and hands
//! each event to the board one at a time, to completion, before taking the
//! next. Moves are sent to the store on spawned tasks and never awaited by the
//! loop; their results come back as events.

use crate::board::{BoardNotice, SprintBoard};
use crate::config::BoardConfig;
use crate::drag::DropTarget;
use crate::error::{BoardError, Result};
use crate::filter::FilterInput;
use crate::materialize::Columns;
use crate::store::{MoveIntent, StoreAdapter, Subscription};
use crate::types::{Sprint, TaskId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Input from the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    DragStart(TaskId),
    DragOver(DropTarget),
    /// `None`: released outside every container
    DragEnd(Option<DropTarget>),
    DragCancel,
    SetFilter(FilterInput),
    SetSprints(Vec<Sprint>),
    /// Re-send a move that failed to sync
    RetrySync(TaskId),
    DismissNotice(TaskId),
    Shutdown,
}

/// What the UI renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardView {
    pub columns: Columns,
    pub dragging: Option<TaskId>,
    /// Tasks whose placement is still optimistic
    pub pending: Vec<TaskId>,
    pub notices: Vec<BoardNotice>,
}

impl BoardView {
    fn of(board: &SprintBoard) -> Self {
        Self {
            columns: board.columns().clone(),
            dragging: board.dragging().cloned(),
            pending: board.pending().iter().map(|p| p.task_id.clone()).collect(),
            notices: board.notices().to_vec(),
        }
    }
}

/// UI-side handle: send gesture events, watch the rendered view
#[derive(Debug, Clone)]
pub struct BoardHandle {
    events: mpsc::UnboundedSender<BoardEvent>,
    view: watch::Receiver<BoardView>,
}

impl BoardHandle {
    pub fn send(&self, event: BoardEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| BoardError::RuntimeStopped)
    }

    pub fn on_drag_start(&self, task_id: impl Into<TaskId>) -> Result<()> {
        self.send(BoardEvent::DragStart(task_id.into()))
    }

    pub fn on_drag_over(&self, target: DropTarget) -> Result<()> {
        self.send(BoardEvent::DragOver(target))
    }

    pub fn on_drag_end(&self, target: Option<DropTarget>) -> Result<()> {
        self.send(BoardEvent::DragEnd(target))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(BoardEvent::Shutdown)
    }

    /// Latest published view
    pub fn view(&self) -> BoardView {
        self.view.borrow().clone()
    }

    /// A receiver that wakes on every published view
    pub fn watch(&self) -> watch::Receiver<BoardView> {
        self.view.clone()
    }
}

type MutationResult = (MoveIntent, Result<()>);

/// Event loop owning a board and its store connection
pub struct BoardRuntime<S: StoreAdapter> {
    board: SprintBoard,
    store: Arc<S>,
    subscription: Subscription,
    events: mpsc::UnboundedReceiver<BoardEvent>,
    results_tx: mpsc::UnboundedSender<MutationResult>,
    results: mpsc::UnboundedReceiver<MutationResult>,
    view: watch::Sender<BoardView>,
    tick: Duration,
}

impl<S: StoreAdapter> BoardRuntime<S> {
    /// Subscribe to the store and build the runtime plus its UI handle
    pub fn new(store: Arc<S>, config: &BoardConfig, sprints: Vec<Sprint>) -> (Self, BoardHandle) {
        let board = SprintBoard::new(sprints, config.filter(), config.lock_policy());
        let subscription = store.subscribe();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (results_tx, results) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(BoardView::of(&board));

        let runtime = Self {
            board,
            store,
            subscription,
            events,
            results_tx,
            results,
            view,
            tick: config.tick_interval(),
        };
        let handle = BoardHandle {
            events: events_tx,
            view: view_rx,
        };
        (runtime, handle)
    }

    /// Run until shutdown, all handles dropped, or the store closes
    pub async fn run(self) -> Result<()> {
        let Self {
            mut board,
            store,
            mut subscription,
            mut events,
            results_tx,
            mut results,
            view,
            tick,
        } = self;

        board.on_snapshot(&subscription.current());
        view.send_replace(BoardView::of(&board));

        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("board runtime started");
        loop {
            tokio::select! {
                snapshot = subscription.next() => {
                    let snapshot = match snapshot {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            tracing::warn!(error = %e, "store subscription ended");
                            return Err(e);
                        }
                    };
                    board.on_snapshot(&snapshot);
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("all board handles dropped");
                        break;
                    };
                    if event == BoardEvent::Shutdown {
                        break;
                    }
                    for intent in handle_event(&mut board, event) {
                        dispatch(&store, &results_tx, intent);
                    }
                }
                Some((intent, result)) = results.recv() => {
                    board.on_mutation_result(&intent, result);
                }
                _ = ticker.tick() => {
                    for intent in board.on_tick(now()) {
                        dispatch(&store, &results_tx, intent);
                    }
                }
            }
            view.send_if_modified(|current| {
                let next = BoardView::of(&board);
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }

        tracing::info!("board runtime stopped");
        Ok(())
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

/// Apply one UI event; returns intents to send to the store
fn handle_event(board: &mut SprintBoard, event: BoardEvent) -> Vec<MoveIntent> {
    let result = match event {
        BoardEvent::DragStart(task_id) => board.on_drag_start(task_id).map(|_| None),
        BoardEvent::DragOver(target) => board.on_drag_over(&target).map(|_| None),
        BoardEvent::DragEnd(target) => board
            .on_drag_end(target.as_ref(), now())
            .map(|outcome| outcome.intent().cloned()),
        BoardEvent::DragCancel => {
            board.on_drag_cancel();
            Ok(None)
        }
        BoardEvent::SetFilter(input) => {
            board.set_filter_input(&input);
            Ok(None)
        }
        BoardEvent::SetSprints(sprints) => {
            board.set_sprints(sprints);
            Ok(None)
        }
        BoardEvent::RetrySync(task_id) => Ok(board.retry_failed(&task_id, now())),
        BoardEvent::DismissNotice(task_id) => {
            board.dismiss(&task_id);
            Ok(None)
        }
        BoardEvent::Shutdown => Ok(None),
    };

    match result {
        Ok(intent) => intent.into_iter().collect(),
        Err(e) => {
            tracing::warn!(error = %e, "board event ignored");
            Vec::new()
        }
    }
}

/// Fire-and-forget: send the move on its own task and post the result back
fn dispatch<S: StoreAdapter>(
    store: &Arc<S>,
    results: &mpsc::UnboundedSender<MutationResult>,
    intent: MoveIntent,
) {
    tracing::debug!(task = %intent.task_id, column = %intent.column, "sending move");
    let store = Arc::clone(store);
    let results = results.clone();
    tokio::spawn(async move {
        let result = store.move_task(intent.clone()).await;
        // loop gone means nobody is left to roll back for
        let _ = results.send((intent, result));
    });
}
