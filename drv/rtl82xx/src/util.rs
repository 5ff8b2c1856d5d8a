// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::Delay;
use rtl_err::RtlError;

/// Outcome of a bounded hardware poll
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Poll {
    Done,
    TimedOut,
}

/// Calls `check` up to `max_attempts` times, sleeping `interval_ms` after
/// every attempt that does not succeed.  Bus errors from `check` end the poll
/// immediately.
///
/// There is no cancellation: a poll that never succeeds always runs to its
/// full bound.
pub fn poll_until<D, F>(
    delay: &D,
    max_attempts: usize,
    interval_ms: u32,
    mut check: F,
) -> Result<Poll, RtlError>
where
    D: Delay + ?Sized,
    F: FnMut() -> Result<bool, RtlError>,
{
    for _ in 0..max_attempts {
        if check()? {
            return Ok(Poll::Done);
        }
        delay.sleep_for(interval_ms);
    }
    Ok(Poll::TimedOut)
}
