//! Real-time review session: decodes the reviewing service's status frames,
//! folds them into participant state machines, and projects the result for
//! rendering.

pub mod codec;
pub mod controller;
pub mod desk;
pub mod error;
pub mod mock;
pub mod projection;
pub mod runner;
pub mod session;
pub mod transport;

pub use codec::{encode_case, DecodeError, DecodeFailure, FrameCodec, FrameKind, ProgressState, ReviewEvent};
pub use controller::{captions, Directive, LinkState, SessionController};
pub use desk::ReviewDesk;
pub use error::{SessionError, TransportError};
pub use projection::{Bubble, Card, FlaggedFinding, RiskSummary, SessionView, Step};
pub use runner::{ReviewOutcome, ReviewRunner, SessionObserver};
pub use session::{Anomaly, Session, SessionPhase};
pub use transport::{Connection, Connector, WsConnection, WsConnector};
