//! # ReviewSession
//!
//! Interactive triage of flagged tiles, one at a time, page by page.
//!
//! ```text
//! Idle -> FetchingPage -> NextTile -> DisplayingTile -> AwaitingAction
//!             ^              |                               |
//!             +--(cursor)----+   open / declined delete -----+ (same tile)
//!                            |   unflag / delete / continue --> NextTile
//!                            +--(no cursor)--> Done(Exhausted)
//! ```
//!
//! Input and display go through a [`ReviewConsole`], so the machine runs
//! unchanged against a terminal or a scripted test double.

use std::collections::VecDeque;
use std::fmt;
use std::future::{self, Future};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use domains::{FlagRecord, LocalTiles};
use serde::Serialize;

use crate::flag_store::FlagStore;
use crate::listing::FlagLister;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Open,
    Unflag,
    Delete,
    Continue,
    Quit,
}

impl ReviewAction {
    pub const PROMPT: &'static str = "(o)pen, (u)nflag, (d)elete file, (c)ontinue, (q)uit";
}

impl FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o" | "open" => Ok(Self::Open),
            "u" | "unflag" => Ok(Self::Unflag),
            "d" | "delete" => Ok(Self::Delete),
            // An empty answer takes the default.
            "" | "c" | "continue" => Ok(Self::Continue),
            "q" | "quit" => Ok(Self::Quit),
            other => Err(format!("unknown action '{other}', choose {}", Self::PROMPT)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Every page was consumed.
    Exhausted,
    Quit,
    /// Input closed or the operator pressed Ctrl-C.
    Interrupted,
    /// A page could not be fetched.
    Aborted(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewTally {
    pub reviewed: usize,
    pub unflagged: usize,
    pub files_deleted: usize,
}

/// Everything the session wants shown to the operator.
#[derive(Debug)]
pub enum ReviewEvent<'a> {
    Tile { position: usize, record: &'a FlagRecord },
    CursorWarning(&'a str),
    NoPath,
    Opened { path: &'a str },
    OpenFailed { path: &'a str, error: String },
    Unflagged { tile_hash: &'a str },
    UnflagFailed { tile_hash: &'a str, error: String },
    FileMissing { path: &'a str },
    DeleteCancelled,
    FileDeleted { path: &'a str },
    FileDeleteFailed { path: &'a str, error: String },
    Finished { outcome: &'a ReviewOutcome, tally: ReviewTally },
}

/// Operator input and output.
#[async_trait]
pub trait ReviewConsole: Send {
    /// `None` once input is closed or interrupted.
    async fn next_action(&mut self) -> Option<ReviewAction>;

    /// `None` once input is closed or interrupted.
    async fn confirm(&mut self, question: &str) -> Option<bool>;

    fn show(&mut self, event: ReviewEvent<'_>);
}

/// Lets a caller lend its console to a session and inspect it afterwards.
#[async_trait]
impl<C: ReviewConsole + ?Sized> ReviewConsole for &mut C {
    async fn next_action(&mut self) -> Option<ReviewAction> {
        (**self).next_action().await
    }

    async fn confirm(&mut self, question: &str) -> Option<bool> {
        (**self).confirm(question).await
    }

    fn show(&mut self, event: ReviewEvent<'_>) {
        (**self).show(event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewReport {
    pub outcome: ReviewOutcome,
    pub tally: ReviewTally,
}

#[derive(Debug)]
enum ReviewState {
    Idle,
    FetchingPage { cursor: Option<String> },
    NextTile,
    DisplayingTile,
    AwaitingAction,
    Done(ReviewOutcome),
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingPage { .. } => "fetching_page",
            Self::NextTile => "next_tile",
            Self::DisplayingTile => "displaying_tile",
            Self::AwaitingAction => "awaiting_action",
            Self::Done(_) => "done",
        };
        f.write_str(name)
    }
}

pub struct ReviewSession<C> {
    lister: FlagLister,
    store: FlagStore,
    tiles: Arc<dyn LocalTiles>,
    console: C,
    page_size: u32,
    page: VecDeque<FlagRecord>,
    next_cursor: Option<String>,
    current: Option<FlagRecord>,
    tally: ReviewTally,
}

impl<C: ReviewConsole> ReviewSession<C> {
    pub fn new(
        lister: FlagLister,
        store: FlagStore,
        tiles: Arc<dyn LocalTiles>,
        console: C,
        page_size: u32,
    ) -> Self {
        Self {
            lister,
            store,
            tiles,
            console,
            page_size: page_size.max(1),
            page: VecDeque::new(),
            next_cursor: None,
            current: None,
            tally: ReviewTally::default(),
        }
    }

    /// Drives the session to a terminal state. The tally is always shown,
    /// whatever the outcome.
    pub async fn run(self) -> ReviewReport {
        self.run_until(future::pending()).await
    }

    /// Like [`run`](Self::run), but ends with [`ReviewOutcome::Interrupted`]
    /// as soon as `interrupt` completes, whichever step is in flight.
    pub async fn run_until<F>(mut self, interrupt: F) -> ReviewReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let mut state = ReviewState::Idle;
        let outcome = loop {
            tracing::trace!(%state, "review transition");
            if let ReviewState::Done(outcome) = state {
                break outcome;
            }
            state = tokio::select! {
                biased;
                () = &mut interrupt => ReviewState::Done(ReviewOutcome::Interrupted),
                next = self.step(state) => next,
            };
        };

        self.console.show(ReviewEvent::Finished {
            outcome: &outcome,
            tally: self.tally,
        });
        ReviewReport {
            outcome,
            tally: self.tally,
        }
    }

    async fn step(&mut self, state: ReviewState) -> ReviewState {
        match state {
            ReviewState::Idle => ReviewState::FetchingPage { cursor: None },
            ReviewState::FetchingPage { cursor } => self.fetch_page(cursor).await,
            ReviewState::NextTile => self.advance(),
            ReviewState::DisplayingTile => self.display(),
            ReviewState::AwaitingAction => match self.console.next_action().await {
                Some(action) => self.apply(action).await,
                None => ReviewState::Done(ReviewOutcome::Interrupted),
            },
            done @ ReviewState::Done(_) => done,
        }
    }

    async fn fetch_page(&mut self, cursor: Option<String>) -> ReviewState {
        match self.lister.list(Some(self.page_size), cursor.as_deref()).await {
            Ok(listing) => {
                if let Some(warning) = &listing.cursor_warning {
                    self.console.show(ReviewEvent::CursorWarning(warning));
                }
                self.page = listing.flags.into();
                self.next_cursor = listing.next_cursor;
                ReviewState::NextTile
            }
            Err(err) => ReviewState::Done(ReviewOutcome::Aborted(err.to_string())),
        }
    }

    fn advance(&mut self) -> ReviewState {
        match self.page.pop_front() {
            Some(record) => {
                self.current = Some(record);
                ReviewState::DisplayingTile
            }
            // A filtered page can come back empty while more pages remain.
            None => match self.next_cursor.take() {
                Some(cursor) => ReviewState::FetchingPage {
                    cursor: Some(cursor),
                },
                None => ReviewState::Done(ReviewOutcome::Exhausted),
            },
        }
    }

    fn display(&mut self) -> ReviewState {
        let Some(record) = &self.current else {
            return ReviewState::NextTile;
        };
        self.tally.reviewed += 1;
        self.console.show(ReviewEvent::Tile {
            position: self.tally.reviewed,
            record,
        });
        ReviewState::AwaitingAction
    }

    async fn apply(&mut self, action: ReviewAction) -> ReviewState {
        let Some(record) = self.current.clone() else {
            return ReviewState::NextTile;
        };
        let path = record.tile_path.as_str();

        match action {
            ReviewAction::Open => {
                if path.is_empty() {
                    self.console.show(ReviewEvent::NoPath);
                } else {
                    match self.tiles.open_in_viewer(path).await {
                        Ok(()) => self.console.show(ReviewEvent::Opened { path }),
                        Err(err) => self.console.show(ReviewEvent::OpenFailed {
                            path,
                            error: err.to_string(),
                        }),
                    }
                }
                ReviewState::AwaitingAction
            }
            ReviewAction::Unflag => {
                if self.unflag(&record).await {
                    ReviewState::NextTile
                } else {
                    ReviewState::AwaitingAction
                }
            }
            ReviewAction::Delete => self.delete_file(&record).await,
            ReviewAction::Continue => ReviewState::NextTile,
            ReviewAction::Quit => ReviewState::Done(ReviewOutcome::Quit),
        }
    }

    async fn unflag(&mut self, record: &FlagRecord) -> bool {
        let tile_hash = record.tile_hash.as_str();
        match self.store.remove(&record.tile_hash).await {
            Ok(()) => {
                self.tally.unflagged += 1;
                self.console.show(ReviewEvent::Unflagged { tile_hash });
                true
            }
            Err(err) => {
                self.console.show(ReviewEvent::UnflagFailed {
                    tile_hash,
                    error: err.to_string(),
                });
                false
            }
        }
    }

    async fn delete_file(&mut self, record: &FlagRecord) -> ReviewState {
        let path = record.tile_path.as_str();
        if path.is_empty() {
            self.console.show(ReviewEvent::NoPath);
            return ReviewState::AwaitingAction;
        }
        if !self.tiles.exists(path) {
            self.console.show(ReviewEvent::FileMissing { path });
            return ReviewState::AwaitingAction;
        }

        let question = format!("Really delete file from disk: {path}?");
        match self.console.confirm(&question).await {
            None => return ReviewState::Done(ReviewOutcome::Interrupted),
            Some(false) => {
                self.console.show(ReviewEvent::DeleteCancelled);
                return ReviewState::AwaitingAction;
            }
            Some(true) => {}
        }

        if let Err(err) = self.tiles.delete(path) {
            self.console.show(ReviewEvent::FileDeleteFailed {
                path,
                error: err.to_string(),
            });
            return ReviewState::AwaitingAction;
        }
        self.tally.files_deleted += 1;
        self.console.show(ReviewEvent::FileDeleted { path });

        // The file is gone either way, so move on even if the unflag fails.
        self.unflag(record).await;
        ReviewState::NextTile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use chrono::{Duration, TimeZone, Utc};
    use domains::testing::ManualClock;
    use domains::{MockLocalTiles, TileHash};
    use storage_adapters::memory::MemoryFlagTable;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct Script {
        actions: VecDeque<Option<ReviewAction>>,
        confirms: VecDeque<bool>,
        shown: Vec<String>,
        /// Fires once the tile at this position has been shown.
        interrupt_after: Option<(usize, oneshot::Sender<()>)>,
    }

    impl Script {
        fn new(actions: &[ReviewAction]) -> Self {
            Self {
                actions: actions.iter().copied().map(Some).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ReviewConsole for Script {
        async fn next_action(&mut self) -> Option<ReviewAction> {
            self.actions.pop_front().flatten()
        }

        async fn confirm(&mut self, _question: &str) -> Option<bool> {
            self.confirms.pop_front()
        }

        fn show(&mut self, event: ReviewEvent<'_>) {
            if let ReviewEvent::Tile { position, .. } = &event {
                if self.interrupt_after.as_ref().is_some_and(|(at, _)| at == position) {
                    if let Some((_, tx)) = self.interrupt_after.take() {
                        let _ = tx.send(());
                    }
                }
            }
            let line = match event {
                ReviewEvent::Tile { record, .. } => format!("tile {}", record.tile_hash),
                ReviewEvent::OpenFailed { .. } => "open failed".into(),
                ReviewEvent::Opened { .. } => "opened".into(),
                ReviewEvent::DeleteCancelled => "cancelled".into(),
                ReviewEvent::FileDeleted { .. } => "file deleted".into(),
                ReviewEvent::Unflagged { tile_hash } => format!("unflagged {tile_hash}"),
                ReviewEvent::Finished { outcome, .. } => format!("finished {outcome:?}"),
                other => format!("{other:?}"),
            };
            self.shown.push(line);
        }
    }

    struct Fixture {
        store: FlagStore,
        lister: FlagLister,
        table: Arc<MemoryFlagTable>,
    }

    async fn fixture(flags: &[(&str, &str)]) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        ));
        let table = Arc::new(MemoryFlagTable::new());
        let store = FlagStore::new(table.clone(), clock.clone());
        for (hash, path) in flags {
            store
                .create(TileHash::parse(hash).unwrap(), path, "ip")
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }
        let lister = FlagLister::new(store.clone(), clock);
        Fixture { store, lister, table }
    }

    fn session(fx: &Fixture, tiles: MockLocalTiles, script: Script, page: u32) -> ReviewSession<Script> {
        ReviewSession::new(fx.lister.clone(), fx.store.clone(), Arc::new(tiles), script, page)
    }

    #[tokio::test]
    async fn unflag_and_continue_until_exhausted() {
        let fx = fixture(&[("a", ""), ("b", ""), ("c", "")]).await;
        let script = Script::new(&[ReviewAction::Unflag, ReviewAction::Continue, ReviewAction::Unflag]);

        let mut script = script;
        let report = ReviewSession::new(
            fx.lister.clone(),
            fx.store.clone(),
            Arc::new(MockLocalTiles::new()),
            &mut script,
            10,
        )
        .run()
        .await;

        assert_eq!(
            script.shown,
            ["tile c", "unflagged c", "tile b", "tile a", "unflagged a", "finished Exhausted"]
        );
        assert_eq!(report.outcome, ReviewOutcome::Exhausted);
        assert_eq!(
            report.tally,
            ReviewTally { reviewed: 3, unflagged: 2, files_deleted: 0 }
        );
        // Newest first: c and a were unflagged, b stays.
        assert_eq!(fx.table.len(), 1);
        assert!(fx.store.get(&TileHash::parse("b").unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn open_stays_on_the_same_tile_even_when_it_fails() {
        let fx = fixture(&[("a", "/tiles/a.png")]).await;
        let mut tiles = MockLocalTiles::new();
        let mut attempts = 0;
        tiles
            .expect_open_in_viewer()
            .withf(|path| path == "/tiles/a.png")
            .times(2)
            .returning(move |_| {
                attempts += 1;
                if attempts == 1 {
                    Err(io::Error::new(io::ErrorKind::NotFound, "no viewer"))
                } else {
                    Ok(())
                }
            });
        let script = Script::new(&[ReviewAction::Open, ReviewAction::Open, ReviewAction::Continue]);

        let report = session(&fx, tiles, script, 10).run().await;

        assert_eq!(report.tally.reviewed, 1);
        assert_eq!(report.outcome, ReviewOutcome::Exhausted);
    }

    #[tokio::test]
    async fn declined_delete_keeps_the_tile_and_file() {
        let fx = fixture(&[("a", "/tiles/a.png")]).await;
        let mut tiles = MockLocalTiles::new();
        tiles.expect_exists().returning(|_| true);
        tiles.expect_delete().never();
        let mut script = Script::new(&[ReviewAction::Delete, ReviewAction::Quit]);
        script.confirms.push_back(false);

        let report = session(&fx, tiles, script, 10).run().await;

        assert_eq!(report.outcome, ReviewOutcome::Quit);
        assert_eq!(report.tally, ReviewTally { reviewed: 1, unflagged: 0, files_deleted: 0 });
        assert_eq!(fx.table.len(), 1);
    }

    #[tokio::test]
    async fn confirmed_delete_removes_file_and_flag() {
        let fx = fixture(&[("a", "/tiles/a.png"), ("b", "/tiles/b.png")]).await;
        let mut tiles = MockLocalTiles::new();
        tiles.expect_exists().returning(|_| true);
        tiles
            .expect_delete()
            .withf(|path| path == "/tiles/b.png")
            .times(1)
            .returning(|_| Ok(()));
        let mut script = Script::new(&[ReviewAction::Delete, ReviewAction::Continue]);
        script.confirms.push_back(true);

        let report = session(&fx, tiles, script, 10).run().await;

        assert_eq!(report.tally, ReviewTally { reviewed: 2, unflagged: 1, files_deleted: 1 });
        assert!(fx.store.get(&TileHash::parse("b").unwrap()).await.unwrap().is_none());
        assert!(fx.store.get(&TileHash::parse("a").unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_file_is_reported_without_leaving_the_tile() {
        let fx = fixture(&[("a", "/tiles/a.png")]).await;
        let mut tiles = MockLocalTiles::new();
        tiles.expect_exists().returning(|_| false);
        let script = Script::new(&[ReviewAction::Delete, ReviewAction::Unflag]);

        let report = session(&fx, tiles, script, 10).run().await;

        assert_eq!(report.tally, ReviewTally { reviewed: 1, unflagged: 1, files_deleted: 0 });
    }

    #[tokio::test]
    async fn interrupt_still_reports_the_tally() {
        let fx = fixture(&[("a", ""), ("b", ""), ("c", "")]).await;
        let mut script = Script::new(&[ReviewAction::Unflag]);
        script.actions.push_back(None);

        let report = session(&fx, MockLocalTiles::new(), script, 10).run().await;

        assert_eq!(report.outcome, ReviewOutcome::Interrupted);
        assert_eq!(report.tally, ReviewTally { reviewed: 2, unflagged: 1, files_deleted: 0 });
    }

    #[tokio::test]
    async fn interrupt_between_prompts_ends_the_session() {
        let fx = fixture(&[("a", ""), ("b", ""), ("c", "")]).await;
        let (tx, rx) = oneshot::channel();
        let mut script = Script::new(&[ReviewAction::Unflag; 3]);
        script.interrupt_after = Some((2, tx));

        let report = ReviewSession::new(
            fx.lister.clone(),
            fx.store.clone(),
            Arc::new(MockLocalTiles::new()),
            &mut script,
            10,
        )
        .run_until(async {
            let _ = rx.await;
        })
        .await;

        assert_eq!(report.outcome, ReviewOutcome::Interrupted);
        assert_eq!(report.tally, ReviewTally { reviewed: 2, unflagged: 1, files_deleted: 0 });
        // The prompt for the second tile was never read.
        assert_eq!(script.actions.len(), 2);
        assert_eq!(
            script.shown,
            ["tile c", "unflagged c", "tile b", "finished Interrupted"]
        );
        assert_eq!(fx.table.len(), 2);
    }

    #[tokio::test]
    async fn interrupt_before_the_first_page_still_reports() {
        let fx = fixture(&[("a", "")]).await;
        let mut script = Script::new(&[ReviewAction::Unflag]);

        let report = ReviewSession::new(
            fx.lister.clone(),
            fx.store.clone(),
            Arc::new(MockLocalTiles::new()),
            &mut script,
            10,
        )
        .run_until(future::ready(()))
        .await;

        assert_eq!(report.outcome, ReviewOutcome::Interrupted);
        assert_eq!(report.tally, ReviewTally::default());
        assert_eq!(script.shown, ["finished Interrupted"]);
        assert_eq!(fx.table.len(), 1);
    }

    #[tokio::test]
    async fn pages_through_every_flag() {
        let flags: Vec<(String, &str)> = (0..5).map(|i| (format!("t{i}"), "")).collect();
        let refs: Vec<(&str, &str)> = flags.iter().map(|(h, p)| (h.as_str(), *p)).collect();
        let fx = fixture(&refs).await;
        let script = Script::new(&[ReviewAction::Continue; 5]);

        let report = session(&fx, MockLocalTiles::new(), script, 2).run().await;

        assert_eq!(report.outcome, ReviewOutcome::Exhausted);
        assert_eq!(report.tally.reviewed, 5);
    }

    #[tokio::test]
    async fn empty_table_ends_immediately() {
        let fx = fixture(&[]).await;
        let report = session(&fx, MockLocalTiles::new(), Script::default(), 10).run().await;

        assert_eq!(report.outcome, ReviewOutcome::Exhausted);
        assert_eq!(report.tally, ReviewTally::default());
    }

    #[test]
    fn parses_action_aliases() {
        assert_eq!("O".parse::<ReviewAction>(), Ok(ReviewAction::Open));
        assert_eq!("unflag".parse::<ReviewAction>(), Ok(ReviewAction::Unflag));
        assert_eq!(" d ".parse::<ReviewAction>(), Ok(ReviewAction::Delete));
        assert_eq!("".parse::<ReviewAction>(), Ok(ReviewAction::Continue));
        assert_eq!("Quit".parse::<ReviewAction>(), Ok(ReviewAction::Quit));
        assert!("x".parse::<ReviewAction>().is_err());
    }
}
