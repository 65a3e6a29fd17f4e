// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Hot sources that are simultaneously producers and consumers.

mod behavior;
mod unicast;

pub use behavior::BehaviorSubject;
pub use unicast::UnicastSubject;
