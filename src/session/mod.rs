// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Playback session: the state core, its audio transport, and autosave

mod autosave;
mod core;
pub mod transport;

pub use autosave::{Autosave, SharedSession};
pub use self::core::{PlaybackPhase, SessionCore};
pub use transport::{AudioTransport, HeadlessTransport, LoadId, TransportEvent};
