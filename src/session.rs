//! Game session
//!
//! One explicit value per drawing round. Pointer events, timer ticks, and
//! prediction responses are applied as discrete calls on `&mut GameSession`;
//! anything the host must do in response comes back as a `SessionEffect`
//! instead of being executed inline.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dispatch::{
    validate_predictions, CooldownGate, PendingPrediction, Prediction, PredictionMode,
};
use crate::error::{SketchError, SketchResult};
use crate::pipeline::build_request;
use crate::surface::DrawingSurface;
use crate::types::Point;

/// Lifecycle state of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// Nothing in progress
    Idle,
    /// Pointer is down
    Capturing,
    /// Pointer is up with predictions in flight
    AwaitingPrediction,
    Won,
    Lost,
    /// Timer ran out; becomes `Lost` once concluded
    Expired,
}

impl RoundState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundState::Won | RoundState::Lost | RoundState::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::Idle => "idle",
            RoundState::Capturing => "capturing",
            RoundState::AwaitingPrediction => "awaiting_prediction",
            RoundState::Won => "won",
            RoundState::Lost => "lost",
            RoundState::Expired => "expired",
        }
    }
}

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Won,
    Lost,
}

impl RoundOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundOutcome::Won => "won",
            RoundOutcome::Lost => "lost",
        }
    }
}

/// Work the host performs on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Send this request and report back through `on_prediction`
    Dispatch(PendingPrediction),
    /// The round is over; announce the outcome
    Finish(RoundOutcome),
}

/// Per-class confidences from the latest applied response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBoard {
    labels: Vec<String>,
    confidences: Vec<f64>,
}

impl ConfidenceBoard {
    pub fn new(labels: Vec<String>) -> Self {
        let confidences = vec![0.0; labels.len()];
        Self {
            labels,
            confidences,
        }
    }

    /// Replace the board with a response. Labels match case-insensitively;
    /// classes the response omits drop to 0 and unknown labels are ignored.
    pub fn apply(&mut self, predictions: &[Prediction]) {
        self.reset();
        for prediction in predictions {
            match self.index_of(&prediction.label) {
                Some(i) => self.confidences[i] = prediction.confidence,
                None => debug!(label = %prediction.label, "ignoring unknown label"),
            }
        }
    }

    pub fn confidence(&self, label: &str) -> Option<f64> {
        self.index_of(label).map(|i| self.confidences[i])
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Confidences aligned with `labels()`
    pub fn confidences(&self) -> &[f64] {
        &self.confidences
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.confidences.iter().copied())
    }

    pub fn reset(&mut self) {
        self.confidences.iter_mut().for_each(|c| *c = 0.0);
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.eq_ignore_ascii_case(label))
    }
}

/// Final record of a concluded round
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round_id: Uuid,
    pub target: String,
    pub outcome: RoundOutcome,
    pub final_state: RoundState,
    pub mode: PredictionMode,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub dispatched: u64,
    pub predictions_applied: u32,
    pub top_guess: Option<Prediction>,
    pub board: ConfidenceBoard,
}

/// State of one drawing round
pub struct GameSession {
    round_id: Uuid,
    target: String,
    mode: PredictionMode,
    model: String,
    config: PipelineConfig,
    surface: DrawingSurface,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    win_threshold: f64,
    gate: CooldownGate,
    next_ticket: u64,
    in_flight: BTreeSet<u64>,
    last_applied: Option<u64>,
    applied: u32,
    board: ConfidenceBoard,
    top_guess: Option<Prediction>,
    state: RoundState,
}

impl GameSession {
    /// Start a round drawing `target`, which must be one of the configured
    /// labels (case-insensitive).
    pub fn start(config: &PipelineConfig, target: &str, now: DateTime<Utc>) -> SketchResult<Self> {
        Self::with_round_id(config, Uuid::new_v4(), target, now)
    }

    /// Start a round with a target picked at random from the configured labels
    pub fn start_random(config: &PipelineConfig, now: DateTime<Utc>) -> SketchResult<Self> {
        let round_id = Uuid::new_v4();
        let labels = &config.round.labels;
        if labels.is_empty() {
            return Err(SketchError::Config(
                "round.labels must name at least one class".to_string(),
            ));
        }
        let index = (round_id.as_u128() % labels.len() as u128) as usize;
        let target = labels[index].clone();
        Self::with_round_id(config, round_id, &target, now)
    }

    fn with_round_id(
        config: &PipelineConfig,
        round_id: Uuid,
        target: &str,
        now: DateTime<Utc>,
    ) -> SketchResult<Self> {
        config.validate()?;
        let target = config
            .find_label(target)
            .ok_or_else(|| SketchError::Config(format!("'{target}' is not a known label")))?
            .to_string();

        let mode = config.dispatch.mode;
        let model = config.dispatch.model_id().to_string();
        let deadline = now + Duration::seconds(config.round.duration_secs as i64);
        info!(%round_id, %target, mode = mode.as_str(), %model, "round started");

        Ok(Self {
            round_id,
            target,
            mode,
            model,
            surface: DrawingSurface::new(config.surface.size(), config.surface.brush_width),
            started_at: now,
            deadline,
            win_threshold: config.round.win_threshold,
            gate: CooldownGate::new(Duration::milliseconds(config.round.cooldown_ms as i64)),
            next_ticket: 1,
            in_flight: BTreeSet::new(),
            last_applied: None,
            applied: 0,
            board: ConfidenceBoard::new(config.round.labels.clone()),
            top_guess: None,
            state: RoundState::Idle,
            config: config.clone(),
        })
    }

    pub fn round_id(&self) -> Uuid {
        self.round_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> PredictionMode {
        self.mode
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn board(&self) -> &ConfidenceBoard {
        &self.board
    }

    /// Top guess of the latest applied response
    pub fn top_guess(&self) -> Option<&Prediction> {
        self.top_guess.as_ref()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn last_applied_ticket(&self) -> Option<u64> {
        self.last_applied
    }

    /// Time left on the clock, never negative
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }

    /// Countdown as `MM:SS`, whole seconds rounded up
    pub fn remaining_display(&self, now: DateTime<Utc>) -> String {
        let millis = self.remaining(now).num_milliseconds();
        let secs = (millis + 999) / 1000;
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    /// Pointer pressed
    pub fn pointer_down(&mut self, p: Point, now: DateTime<Utc>) -> Vec<SessionEffect> {
        let effects = self.tick(now);
        if self.state.is_terminal() {
            return effects;
        }
        if self.surface.pointer_down(p) {
            self.transition(RoundState::Capturing);
        }
        effects
    }

    /// Pointer dragged. Dispatches when the cooldown gate allows.
    pub fn pointer_move(&mut self, p: Point, now: DateTime<Utc>) -> Vec<SessionEffect> {
        let mut effects = self.tick(now);
        if self.state != RoundState::Capturing {
            return effects;
        }
        if self.surface.pointer_move(p) && self.gate.try_acquire(now) {
            effects.extend(self.dispatch(now));
        }
        effects
    }

    /// Pointer released. Always dispatches and leaves the cooldown gate alone.
    pub fn pointer_up(&mut self, now: DateTime<Utc>) -> Vec<SessionEffect> {
        let mut effects = self.tick(now);
        if self.state.is_terminal() {
            return effects;
        }
        self.surface.pointer_up();
        effects.extend(self.dispatch(now));
        if self.in_flight.is_empty() {
            self.transition(RoundState::Idle);
        } else {
            self.transition(RoundState::AwaitingPrediction);
        }
        effects
    }

    /// Advance the clock. Expires the round once the deadline passes.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SessionEffect> {
        if self.state.is_terminal() || now < self.deadline {
            return Vec::new();
        }
        self.in_flight.clear();
        self.transition(RoundState::Expired);
        vec![SessionEffect::Finish(RoundOutcome::Lost)]
    }

    /// Apply the result of a dispatched request.
    ///
    /// Discarded when the round is over, when the ticket is unknown, or when
    /// a newer response was already applied. A failed round trip only
    /// retires its ticket.
    pub fn on_prediction(
        &mut self,
        ticket: u64,
        result: SketchResult<Vec<Prediction>>,
    ) -> Vec<SessionEffect> {
        if self.state.is_terminal() {
            debug!(ticket, state = self.state.as_str(), "round over, discarding response");
            return Vec::new();
        }
        if !self.in_flight.remove(&ticket) {
            debug!(ticket, "discarding response for unknown ticket");
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.last_applied.is_some_and(|last| ticket < last) {
            debug!(ticket, last_applied = ?self.last_applied, "discarding stale response");
        } else {
            match result.and_then(validate_predictions) {
                Ok(predictions) => effects.extend(self.apply(ticket, predictions)),
                Err(e) => warn!(ticket, error = %e, "prediction failed, board unchanged"),
            }
        }

        if self.state == RoundState::AwaitingPrediction && self.in_flight.is_empty() {
            self.transition(RoundState::Idle);
        }
        effects
    }

    /// End the round. An expired or abandoned round counts as lost.
    pub fn conclude(mut self, now: DateTime<Utc>) -> RoundSummary {
        let outcome = if self.state == RoundState::Won {
            RoundOutcome::Won
        } else {
            self.transition(RoundState::Lost);
            RoundOutcome::Lost
        };
        info!(round_id = %self.round_id, outcome = outcome.as_str(), "round concluded");

        RoundSummary {
            round_id: self.round_id,
            target: self.target,
            outcome,
            final_state: self.state,
            mode: self.mode,
            model: self.model,
            started_at: self.started_at,
            ended_at: now,
            dispatched: self.next_ticket - 1,
            predictions_applied: self.applied,
            top_guess: self.top_guess,
            board: self.board,
        }
    }

    fn dispatch(&mut self, now: DateTime<Utc>) -> Option<SessionEffect> {
        let request = match build_request(self.mode, &self.model, &self.surface, &self.config) {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to build prediction request");
                return None;
            }
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(ticket);
        debug!(ticket, in_flight = self.in_flight.len(), "prediction dispatched");
        Some(SessionEffect::Dispatch(PendingPrediction {
            ticket,
            request,
            issued_at: now,
        }))
    }

    fn apply(&mut self, ticket: u64, predictions: Vec<Prediction>) -> Option<SessionEffect> {
        self.last_applied = Some(ticket);
        self.applied += 1;
        self.board.apply(&predictions);
        self.top_guess = predictions.into_iter().next();

        let top = self.top_guess.as_ref()?;
        debug!(ticket, label = %top.label, confidence = top.confidence, "top guess");
        if top.is_label(&self.target) && top.confidence >= self.win_threshold {
            self.in_flight.clear();
            self.transition(RoundState::Won);
            return Some(SessionEffect::Finish(RoundOutcome::Won));
        }
        None
    }

    fn transition(&mut self, next: RoundState) {
        if self.state != next {
            info!(
                round_id = %self.round_id,
                from = self.state.as_str(),
                to = next.as_str(),
                "round state changed"
            );
            self.state = next;
        }
    }
}

/// Host side of outcome announcement
pub trait EffectSink {
    /// Start playing an audio clip, returning its length
    fn play(&mut self, clip: &str) -> SketchResult<std::time::Duration>;

    /// Navigate to `destination` once `after` has elapsed
    fn navigate(&mut self, destination: &str, after: std::time::Duration);
}

/// What the announcer asked the sink to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub outcome: RoundOutcome,
    pub destination: String,
    pub delay: std::time::Duration,
    pub played: bool,
}

/// Plays the outcome sound, then navigates to the outcome page.
///
/// Playback failure falls back to immediate navigation.
#[derive(Debug, Clone)]
pub struct OutcomeAnnouncer {
    win_clip: String,
    lose_clip: String,
    win_page: String,
    lose_page: String,
}

impl Default for OutcomeAnnouncer {
    fn default() -> Self {
        Self {
            win_clip: "win.wav".to_string(),
            lose_clip: "lose.wav".to_string(),
            win_page: "win.html".to_string(),
            lose_page: "lose.html".to_string(),
        }
    }
}

impl OutcomeAnnouncer {
    pub fn new(
        win_clip: impl Into<String>,
        lose_clip: impl Into<String>,
        win_page: impl Into<String>,
        lose_page: impl Into<String>,
    ) -> Self {
        Self {
            win_clip: win_clip.into(),
            lose_clip: lose_clip.into(),
            win_page: win_page.into(),
            lose_page: lose_page.into(),
        }
    }

    pub fn announce<S: EffectSink + ?Sized>(&self, outcome: RoundOutcome, sink: &mut S) -> Announcement {
        let (clip, page) = match outcome {
            RoundOutcome::Won => (&self.win_clip, &self.win_page),
            RoundOutcome::Lost => (&self.lose_clip, &self.lose_page),
        };

        let (delay, played) = match sink.play(clip) {
            Ok(length) => (length, true),
            Err(e) => {
                warn!(clip = %clip, error = %e, "playback failed, navigating immediately");
                (std::time::Duration::ZERO, false)
            }
        };
        sink.navigate(page, delay);

        Announcement {
            outcome,
            destination: page.clone(),
            delay,
            played,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{PredictionDispatcher, PredictionRequest};
    use pretty_assertions::assert_eq;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    fn config(mode: PredictionMode) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.surface.width = 200;
        config.surface.height = 200;
        config.dispatch.mode = mode;
        config
    }

    fn tickets(effects: &[SessionEffect]) -> Vec<u64> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::Dispatch(pending) => Some(pending.ticket),
                _ => None,
            })
            .collect()
    }

    /// Draw one stroke; returns the dispatched tickets
    fn draw_stroke(session: &mut GameSession, start_ms: i64) -> Vec<u64> {
        let mut effects = session.pointer_down(Point::new(50.0, 50.0), at(start_ms));
        effects.extend(session.pointer_move(Point::new(100.0, 80.0), at(start_ms + 10)));
        effects.extend(session.pointer_move(Point::new(150.0, 50.0), at(start_ms + 20)));
        effects.extend(session.pointer_up(at(start_ms + 30)));
        tickets(&effects)
    }

    #[test]
    fn test_start_resolves_target() {
        let session = GameSession::start(&config(PredictionMode::Raster), "Moon", at(0)).unwrap();
        assert_eq!(session.target(), "moon");
        assert_eq!(session.state(), RoundState::Idle);
        assert_eq!(session.model(), "model1");
        assert_eq!(session.deadline(), at(20_000));

        assert!(GameSession::start(&config(PredictionMode::Raster), "dog", at(0)).is_err());
    }

    #[test]
    fn test_start_random_picks_known_label() {
        let config = config(PredictionMode::Sequence);
        let session = GameSession::start_random(&config, at(0)).unwrap();
        assert!(config.find_label(session.target()).is_some());
        assert_eq!(session.model(), "model2");
    }

    #[test]
    fn test_drag_dispatch_respects_cooldown() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "cat", at(0)).unwrap();
        assert!(session.pointer_down(Point::new(20.0, 20.0), at(0)).is_empty());
        assert_eq!(session.state(), RoundState::Capturing);

        // First drag opens the gate, the next one inside 1500 ms does not
        assert_eq!(tickets(&session.pointer_move(Point::new(30.0, 30.0), at(100))), vec![1]);
        assert!(session.pointer_move(Point::new(40.0, 40.0), at(1600)).is_empty());
        assert_eq!(tickets(&session.pointer_move(Point::new(50.0, 50.0), at(1601))), vec![2]);

        // Release always dispatches
        assert_eq!(tickets(&session.pointer_up(at(1700))), vec![3]);
        assert_eq!(session.state(), RoundState::AwaitingPrediction);
        assert_eq!(session.in_flight(), 3);
    }

    #[test]
    fn test_raster_dispatches_blank_drawing() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "cat", at(0)).unwrap();
        let effects = session.pointer_up(at(10));
        match &effects[..] {
            [SessionEffect::Dispatch(pending)] => match &pending.request {
                PredictionRequest::Raster { pixels, .. } => assert!(pixels.is_blank()),
                other => panic!("unexpected request {other:?}"),
            },
            other => panic!("unexpected effects {other:?}"),
        }
    }

    #[test]
    fn test_sequence_skips_empty_drawing() {
        let mut session =
            GameSession::start(&config(PredictionMode::Sequence), "cat", at(0)).unwrap();
        // Off-surface press is ignored, so there is nothing to encode
        session.pointer_down(Point::new(500.0, 500.0), at(0));
        assert!(session.pointer_up(at(10)).is_empty());
        assert_eq!(session.state(), RoundState::Idle);

        assert_eq!(draw_stroke(&mut session, 100), vec![1, 2]);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        assert_eq!(draw_stroke(&mut session, 0), vec![1, 2]);

        session.on_prediction(2, Ok(vec![Prediction::new("cat", 0.5)]));
        assert_eq!(session.last_applied_ticket(), Some(2));

        // Older ticket arrives late with a winning guess; it must not apply
        let effects = session.on_prediction(1, Ok(vec![Prediction::new("moon", 0.95)]));
        assert!(effects.is_empty());
        assert_eq!(session.board().confidence("cat"), Some(0.5));
        assert_eq!(session.board().confidence("moon"), Some(0.0));
        assert_eq!(session.state(), RoundState::Idle);
    }

    #[test]
    fn test_unknown_ticket_is_ignored() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        draw_stroke(&mut session, 0);
        assert!(session
            .on_prediction(42, Ok(vec![Prediction::new("moon", 1.0)]))
            .is_empty());
        assert_eq!(session.in_flight(), 2);
    }

    #[test]
    fn test_failed_round_trip_leaves_board_unchanged() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        assert_eq!(draw_stroke(&mut session, 0), vec![1, 2]);

        session.on_prediction(1, Ok(vec![Prediction::new("tree", 0.4), Prediction::new("cat", 0.3)]));
        let before = session.board().clone();

        let effects = session.on_prediction(2, Err(SketchError::Transport("connection refused".into())));
        assert!(effects.is_empty());
        assert_eq!(session.board(), &before);
        assert_eq!(session.top_guess(), Some(&Prediction::new("tree", 0.4)));
        assert_eq!(session.in_flight(), 0);
        assert_eq!(session.state(), RoundState::Idle);
    }

    #[test]
    fn test_invalid_response_counts_as_failure() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        draw_stroke(&mut session, 0);
        session.on_prediction(2, Ok(vec![Prediction::new("moon", 4.0)]));

        assert_eq!(session.state(), RoundState::AwaitingPrediction);
        assert_eq!(session.last_applied_ticket(), None);
        assert_eq!(session.board().confidence("moon"), Some(0.0));
    }

    #[test]
    fn test_confident_correct_guess_wins_once() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        draw_stroke(&mut session, 0);

        let effects = session.on_prediction(1, Ok(vec![Prediction::new("MOON", 0.8)]));
        assert_eq!(effects, vec![SessionEffect::Finish(RoundOutcome::Won)]);
        assert_eq!(session.state(), RoundState::Won);

        // Everything after the win is inert
        assert!(session.on_prediction(2, Ok(vec![Prediction::new("moon", 0.99)])).is_empty());
        assert!(session.pointer_down(Point::new(10.0, 10.0), at(100)).is_empty());
        assert!(session.pointer_up(at(110)).is_empty());
        assert!(session.tick(at(30_000)).is_empty());

        let summary = session.conclude(at(30_000));
        assert_eq!(summary.outcome, RoundOutcome::Won);
        assert_eq!(summary.final_state, RoundState::Won);
        assert_eq!(summary.predictions_applied, 1);
        assert_eq!(summary.dispatched, 2);
    }

    #[test]
    fn test_weak_or_wrong_guess_does_not_win() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        draw_stroke(&mut session, 0);

        assert!(session.on_prediction(1, Ok(vec![Prediction::new("moon", 0.79)])).is_empty());
        assert!(session
            .on_prediction(2, Ok(vec![Prediction::new("cat", 0.9), Prediction::new("moon", 0.1)]))
            .is_empty());
        assert_eq!(session.state(), RoundState::Idle);
    }

    #[test]
    fn test_unsorted_response_uses_highest_confidence() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        draw_stroke(&mut session, 0);

        let effects = session.on_prediction(
            2,
            Ok(vec![Prediction::new("cat", 0.05), Prediction::new("moon", 0.9)]),
        );
        assert_eq!(effects, vec![SessionEffect::Finish(RoundOutcome::Won)]);
    }

    #[test]
    fn test_timer_expiry_then_lost() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "cat", at(0)).unwrap();
        draw_stroke(&mut session, 0);

        assert!(session.tick(at(19_999)).is_empty());
        assert_eq!(session.tick(at(20_000)), vec![SessionEffect::Finish(RoundOutcome::Lost)]);
        assert_eq!(session.state(), RoundState::Expired);
        assert!(session.tick(at(21_000)).is_empty());

        // Late responses are dropped
        assert!(session.on_prediction(1, Ok(vec![Prediction::new("cat", 1.0)])).is_empty());

        let summary = session.conclude(at(21_000));
        assert_eq!(summary.outcome, RoundOutcome::Lost);
        assert_eq!(summary.final_state, RoundState::Lost);
    }

    #[test]
    fn test_pointer_event_after_deadline_expires() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "cat", at(0)).unwrap();
        let effects = session.pointer_down(Point::new(10.0, 10.0), at(25_000));
        assert_eq!(effects, vec![SessionEffect::Finish(RoundOutcome::Lost)]);
        assert_eq!(session.surface().capture().point_count(), 0);
    }

    #[test]
    fn test_remaining_display() {
        let session = GameSession::start(&config(PredictionMode::Raster), "cat", at(0)).unwrap();
        assert_eq!(session.remaining_display(at(0)), "00:20");
        assert_eq!(session.remaining_display(at(1_000)), "00:19");
        assert_eq!(session.remaining_display(at(19_500)), "00:01");
        assert_eq!(session.remaining_display(at(25_000)), "00:00");
        assert_eq!(session.remaining(at(25_000)), Duration::zero());
    }

    #[test]
    fn test_board_tracks_latest_response() {
        let mut board = ConfidenceBoard::new(vec!["cat".into(), "moon".into()]);
        board.apply(&[Prediction::new("Cat", 0.6), Prediction::new("dragon", 0.3)]);
        assert_eq!(board.confidences(), &[0.6, 0.0]);

        board.apply(&[Prediction::new("moon", 0.7)]);
        assert_eq!(board.confidences(), &[0.0, 0.7]);
        assert_eq!(
            board.entries().collect::<Vec<_>>(),
            vec![("cat", 0.0), ("moon", 0.7)]
        );
    }

    #[test]
    fn test_dispatcher_drives_round_to_win() {
        let mut session = GameSession::start(&config(PredictionMode::Sequence), "moon", at(0)).unwrap();
        let mut effects = session.pointer_down(Point::new(50.0, 50.0), at(0));
        effects.extend(session.pointer_move(Point::new(120.0, 90.0), at(10)));
        effects.extend(session.pointer_up(at(20)));

        let mut seen = Vec::new();
        let mut dispatcher = PredictionDispatcher::new(|request: &PredictionRequest| -> SketchResult<Vec<Prediction>> {
            seen.push(request.mode());
            Ok(vec![Prediction::new("moon", 0.93), Prediction::new("cat", 0.02)])
        });
        let remaining = dispatcher.drive(&mut session, effects);
        drop(dispatcher);

        assert_eq!(remaining, vec![SessionEffect::Finish(RoundOutcome::Won)]);
        assert_eq!(seen, vec![PredictionMode::Sequence, PredictionMode::Sequence]);
        assert_eq!(session.state(), RoundState::Won);
    }

    #[test]
    fn test_dispatcher_swallows_transport_errors() {
        let mut session = GameSession::start(&config(PredictionMode::Raster), "moon", at(0)).unwrap();
        let effects = session.pointer_up(at(10));

        let mut dispatcher = PredictionDispatcher::new(
            |_: &PredictionRequest| -> SketchResult<Vec<Prediction>> {
                Err(SketchError::Transport("timeout".to_string()))
            },
        );
        assert!(dispatcher.drive(&mut session, effects).is_empty());
        assert_eq!(session.state(), RoundState::Idle);
        assert!(session.board().confidences().iter().all(|c| *c == 0.0));
    }

    #[derive(Default)]
    struct RecordingSink {
        fail_playback: bool,
        navigations: Vec<(String, std::time::Duration)>,
    }

    impl EffectSink for RecordingSink {
        fn play(&mut self, clip: &str) -> SketchResult<std::time::Duration> {
            if self.fail_playback {
                Err(SketchError::Playback(format!("autoplay blocked for {clip}")))
            } else {
                Ok(std::time::Duration::from_millis(1200))
            }
        }

        fn navigate(&mut self, destination: &str, after: std::time::Duration) {
            self.navigations.push((destination.to_string(), after));
        }
    }

    #[test]
    fn test_announcer_waits_for_clip() {
        let mut sink = RecordingSink::default();
        let announcement = OutcomeAnnouncer::default().announce(RoundOutcome::Won, &mut sink);

        assert!(announcement.played);
        assert_eq!(
            sink.navigations,
            vec![("win.html".to_string(), std::time::Duration::from_millis(1200))]
        );
    }

    #[test]
    fn test_announcer_falls_back_on_playback_failure() {
        let mut sink = RecordingSink {
            fail_playback: true,
            ..Default::default()
        };
        let announcement = OutcomeAnnouncer::default().announce(RoundOutcome::Lost, &mut sink);

        assert!(!announcement.played);
        assert_eq!(announcement.destination, "lose.html");
        assert_eq!(
            sink.navigations,
            vec![("lose.html".to_string(), std::time::Duration::ZERO)]
        );
    }
}
