//! Pure vesting arithmetic.
//!
//! Everything here is a function of plain integers: no storage, no clock.
//! The contract feeds in a stream's window, rate and remaining balance
//! together with the current ledger time and gets the two parties' claims
//! back.

/// Seconds of `[start_time, stop_time]` elapsed at `now`, clamped to the
/// window: 0 at or before the start, the full window length at or after the
/// stop.
pub fn elapsed_delta(start_time: u64, stop_time: u64, now: u64) -> u64 {
    if now <= start_time {
        0
    } else if now < stop_time {
        now - start_time
    } else {
        stop_time - start_time
    }
}

/// The recipient's claim: everything vested so far, capped at what the stream
/// still holds.
///
/// The cap binds once earlier withdrawals have taken the remaining balance
/// below the time-implied vested amount; from then on the recipient is owed
/// whatever is left and the sender's side is zero.
pub fn recipient_share(delta: u64, rate_per_second: i128, remaining_balance: i128) -> i128 {
    // The multiplication cannot overflow: `delta` never exceeds the stream
    // duration, and rate * duration is the original deposit, which fit in an
    // i128 at creation.
    let vested = delta as i128 * rate_per_second;
    vested.min(remaining_balance)
}

/// The sender's claim: whatever of the remaining balance is not the
/// recipient's. Never negative, by the cap in `recipient_share`.
pub fn sender_share(delta: u64, rate_per_second: i128, remaining_balance: i128) -> i128 {
    remaining_balance - recipient_share(delta, rate_per_second, remaining_balance)
}
