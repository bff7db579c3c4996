#![no_std]

mod vesting;

use soroban_sdk::{contract, contractimpl, contracttype, symbol_short, token, Address, Env};

/// First id handed out by `create_stream`. Ids below the base never name a
/// stream, and ids are never reassigned once their stream is gone.
const STREAM_ID_BASE: u64 = 1000;

// TTL bumps applied on every write so an actively used entry never expires
// between interactions.
const TTL_THRESHOLD: u32 = 17280;
const TTL_EXTEND_TO: u32 = 120960;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single vesting stream: a fixed deposit of `token` flowing from `sender`
/// to `recipient` at `rate_per_second` over `[start_time, stop_time]`.
///
/// Every field except `remaining_balance` is fixed at creation.
/// `remaining_balance` starts equal to `deposit` and only decreases; both
/// parties' claims are recomputed from it and the clock on every read, so no
/// per-withdrawal history is kept.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Stream {
    pub id: u64,
    pub sender: Address,
    pub recipient: Address,
    pub token: Address,
    pub start_time: u64,
    pub stop_time: u64,
    pub deposit: i128,
    pub rate_per_second: i128,
    pub remaining_balance: i128,
}

/// Every way a call can fail. Codes are stable so clients can branch on them.
#[soroban_sdk::contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    /// No stream is stored under the given id.
    InvalidStreamId = 1,
    /// The recipient is the token contract being streamed.
    InvalidRecipientAddress = 2,
    /// The recipient is the sender.
    SenderCannotBeRecipient = 3,
    /// The recipient is this contract.
    ContractCannotBeRecipient = 4,
    /// A zero or negative amount where a positive one is required.
    InvalidAmount = 5,
    /// The token address is this contract.
    InvalidTokenAddress = 6,
    /// The start time is already in the past.
    InvalidStartTime = 7,
    /// The stop time is not after the start time.
    InvalidTimeDelta = 8,
    /// The deposit is smaller than the window length in seconds.
    DepositSmallerThanDuration = 9,
    /// The deposit does not divide evenly over the window.
    DepositNotMultipleOfDuration = 10,
    /// The sender's token balance does not cover the deposit.
    InsufficientBalance = 11,
    /// The allowance granted to this contract does not cover the deposit.
    InsufficientAllowance = 12,
    /// The caller is neither the stream's sender nor its recipient.
    InvalidAddress = 13,
    /// The requested amount exceeds the caller's current share.
    AmountExceedsBalance = 14,
}

/// How an address relates to a stream. Party checks match on this instead of
/// comparing against sentinel addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Party {
    Sender,
    Recipient,
    Outsider,
}

/// Namespace for all contract storage keys.
#[contracttype]
pub enum DataKey {
    NextStreamId, // Instance storage for the auto-incrementing id counter.
    Stream(u64),  // Persistent storage for individual stream data (O(1) lookup).
}

// ---------------------------------------------------------------------------
// Storage helpers
// ---------------------------------------------------------------------------

fn next_id(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::NextStreamId)
        .unwrap_or(STREAM_ID_BASE)
}

fn reserve_id(env: &Env) -> u64 {
    let id = next_id(env);
    env.storage().instance().set(&DataKey::NextStreamId, &(id + 1));
    env.storage().instance().extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);
    id
}

fn load_stream(env: &Env, stream_id: u64) -> Result<Stream, ContractError> {
    env.storage()
        .persistent()
        .get(&DataKey::Stream(stream_id))
        .ok_or(ContractError::InvalidStreamId)
}

fn save_stream(env: &Env, stream: &Stream) {
    let key = DataKey::Stream(stream.id);
    env.storage().persistent().set(&key, stream);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

fn delete_stream(env: &Env, stream_id: u64) {
    env.storage().persistent().remove(&DataKey::Stream(stream_id));
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

impl VestingStream {
    fn validate_create(
        env: &Env,
        sender: &Address,
        recipient: &Address,
        deposit: i128,
        token: &Address,
        start_time: u64,
        stop_time: u64,
    ) -> Result<(), ContractError> {
        let this = env.current_contract_address();

        // Check: the recipient is not the token being streamed.
        if recipient == token {
            return Err(ContractError::InvalidRecipientAddress);
        }
        // Check: the sender is not streaming to themselves.
        if recipient == sender {
            return Err(ContractError::SenderCannotBeRecipient);
        }
        // Check: the recipient is not this contract.
        if *recipient == this {
            return Err(ContractError::ContractCannotBeRecipient);
        }
        // Check: the deposit is positive.
        if deposit <= 0 {
            return Err(ContractError::InvalidAmount);
        }
        // Check: this contract is not passed off as the token.
        if *token == this {
            return Err(ContractError::InvalidTokenAddress);
        }
        // Check: the window does not start in the past.
        if start_time < env.ledger().timestamp() {
            return Err(ContractError::InvalidStartTime);
        }
        // Check: the window has positive length.
        if stop_time <= start_time {
            return Err(ContractError::InvalidTimeDelta);
        }

        let duration = (stop_time - start_time) as i128;
        // Check: the rate works out to at least one token unit per second.
        if deposit < duration {
            return Err(ContractError::DepositSmallerThanDuration);
        }
        // Check: the deposit divides evenly, so the stored rate is exact.
        if deposit % duration != 0 {
            return Err(ContractError::DepositNotMultipleOfDuration);
        }

        Ok(())
    }

    fn classify(stream: &Stream, who: &Address) -> Party {
        if *who == stream.recipient {
            Party::Recipient
        } else if *who == stream.sender {
            Party::Sender
        } else {
            Party::Outsider
        }
    }

    /// Both parties' claims on `remaining_balance` at the current ledger time,
    /// as `(recipient_share, sender_share)`. The two always sum to the
    /// stream's remaining balance.
    fn shares_at_now(env: &Env, stream: &Stream) -> (i128, i128) {
        let delta = vesting::elapsed_delta(
            stream.start_time,
            stream.stop_time,
            env.ledger().timestamp(),
        );
        (
            vesting::recipient_share(delta, stream.rate_per_second, stream.remaining_balance),
            vesting::sender_share(delta, stream.rate_per_second, stream.remaining_balance),
        )
    }
}

// ---------------------------------------------------------------------------
// Contract implementation
// ---------------------------------------------------------------------------

#[contract]
pub struct VestingStream;

#[contractimpl]
impl VestingStream {
    /// Create a new vesting stream from `sender` to `recipient`.
    ///
    /// Pulls `deposit` of `token` from the sender into the contract through a
    /// previously granted allowance, then starts releasing it to the
    /// recipient at a constant per-second rate over `[start_time, stop_time]`.
    /// The deposit must divide evenly over the window so the stored rate has
    /// no remainder.
    ///
    /// # Parameters
    /// - `sender`: funds the stream; must authorize the call and must have
    ///   approved this contract for at least `deposit`
    /// - `recipient`: receives the vested tokens
    /// - `deposit`: total amount to lock (must be > 0)
    /// - `token`: the token contract to stream
    /// - `start_time` / `stop_time`: vesting window (ledger timestamps)
    ///
    /// # Returns
    /// - `u64`: the new stream's id; ids are sequential starting at 1000 and
    ///   are never reused
    ///
    /// # Errors
    /// Validation runs in a fixed order and reports the first failure; see
    /// `ContractError` for the full set. A rejected creation moves no tokens
    /// and does not advance the id counter.
    ///
    /// # Events
    /// - Publishes `created(stream_id)` with the parties, token and deposit
    pub fn create_stream(
        env: Env,
        sender: Address,
        recipient: Address,
        deposit: i128,
        token: Address,
        start_time: u64,
        stop_time: u64,
    ) -> Result<u64, ContractError> {
        sender.require_auth();

        Self::validate_create(
            &env, &sender, &recipient, deposit, &token, start_time, stop_time,
        )?;

        let this = env.current_contract_address();
        let token_client = token::Client::new(&env, &token);

        // Check: the sender can fund the deposit.
        if token_client.balance(&sender) < deposit {
            return Err(ContractError::InsufficientBalance);
        }
        // Check: the sender has approved this contract for the deposit.
        if token_client.allowance(&sender, &this) < deposit {
            return Err(ContractError::InsufficientAllowance);
        }

        // Pull the deposit first; the id is reserved and state persisted only
        // after the transfer succeeds, so a failed transfer leaves no trace.
        token_client.transfer_from(&this, &sender, &this, &deposit);

        let duration = (stop_time - start_time) as i128;
        let stream_id = reserve_id(&env);
        let stream = Stream {
            id: stream_id,
            sender: sender.clone(),
            recipient: recipient.clone(),
            token: token.clone(),
            start_time,
            stop_time,
            deposit,
            rate_per_second: deposit / duration,
            remaining_balance: deposit,
        };
        save_stream(&env, &stream);

        env.events().publish(
            (symbol_short!("created"), stream_id),
            (sender, recipient, token, deposit),
        );

        Ok(stream_id)
    }

    /// The full stored state of a stream.
    ///
    /// # Errors
    /// - `InvalidStreamId`: no stream under this id (never created, or
    ///   cancelled)
    pub fn get_stream(env: Env, stream_id: u64) -> Result<Stream, ContractError> {
        load_stream(&env, stream_id)
    }

    /// Seconds of the stream's window elapsed at the current ledger time:
    /// 0 before `start_time`, capped at the full window length after
    /// `stop_time`.
    ///
    /// # Errors
    /// - `InvalidStreamId`: no stream under this id
    pub fn delta_of(env: Env, stream_id: u64) -> Result<u64, ContractError> {
        let stream = load_stream(&env, stream_id)?;
        Ok(vesting::elapsed_delta(
            stream.start_time,
            stream.stop_time,
            env.ledger().timestamp(),
        ))
    }

    /// `who`'s current claim on the stream's remaining balance.
    ///
    /// The recipient's claim is the vested-so-far amount, capped at what the
    /// stream still holds; the sender's claim is the rest. Any other address
    /// has no claim and gets 0. The two parties' balances always sum to the
    /// stream's `remaining_balance`.
    ///
    /// # Errors
    /// - `InvalidStreamId`: no stream under this id
    pub fn balance_of(env: Env, stream_id: u64, who: Address) -> Result<i128, ContractError> {
        let stream = load_stream(&env, stream_id)?;
        let (recipient_share, sender_share) = Self::shares_at_now(&env, &stream);
        let balance = match Self::classify(&stream, &who) {
            Party::Recipient => recipient_share,
            Party::Sender => sender_share,
            Party::Outsider => 0,
        };
        Ok(balance)
    }

    /// Withdraw `amount` from the caller's share of a stream.
    ///
    /// Both parties draw from the same remaining balance, each bounded by
    /// their own side of the split: the recipient by what has vested so far,
    /// the sender by what has not. The withdrawal reduces the stream's
    /// `remaining_balance`; later claims are recomputed from what is left.
    ///
    /// The stream stays stored even once its remaining balance reaches zero;
    /// only `cancel_stream` removes it.
    ///
    /// # Errors
    /// - `InvalidStreamId`: no stream under this id
    /// - `InvalidAddress`: caller is neither sender nor recipient
    /// - `InvalidAmount`: `amount <= 0`
    /// - `AmountExceedsBalance`: `amount` is more than the caller's current
    ///   share
    ///
    /// # Events
    /// - Publishes `withdrew(stream_id)` with the caller and amount
    pub fn withdraw_from_stream(
        env: Env,
        caller: Address,
        stream_id: u64,
        amount: i128,
    ) -> Result<(), ContractError> {
        caller.require_auth();

        let mut stream = load_stream(&env, stream_id)?;

        // Check: only the stream's parties may withdraw.
        let party = Self::classify(&stream, &caller);
        if party == Party::Outsider {
            return Err(ContractError::InvalidAddress);
        }
        // Check: the amount is positive.
        if amount <= 0 {
            return Err(ContractError::InvalidAmount);
        }
        // Check: the caller draws from their own share only.
        let (recipient_share, sender_share) = Self::shares_at_now(&env, &stream);
        let available = if party == Party::Recipient {
            recipient_share
        } else {
            sender_share
        };
        if amount > available {
            return Err(ContractError::AmountExceedsBalance);
        }

        // CEI: update state before the external token transfer.
        stream.remaining_balance -= amount;
        save_stream(&env, &stream);

        let token_client = token::Client::new(&env, &stream.token);
        token_client.transfer(&env.current_contract_address(), &caller, &amount);

        env.events()
            .publish((symbol_short!("withdrew"), stream_id), (caller, amount));
        Ok(())
    }

    /// Cancel a stream and settle both sides.
    ///
    /// Either party may cancel at any time. The remaining balance is split at
    /// the current ledger time: the vested portion goes to the recipient, the
    /// rest back to the sender (a zero share skips its transfer). The record
    /// is removed, so every later call with this id fails `InvalidStreamId`;
    /// the id is never reassigned.
    ///
    /// # Errors
    /// - `InvalidStreamId`: no stream under this id (including one already
    ///   cancelled)
    /// - `InvalidAddress`: caller is neither sender nor recipient
    ///
    /// # Events
    /// - Publishes `cancelled(stream_id)` with the sender's and recipient's
    ///   settled shares
    pub fn cancel_stream(env: Env, caller: Address, stream_id: u64) -> Result<(), ContractError> {
        caller.require_auth();

        let stream = load_stream(&env, stream_id)?;

        // Check: only the stream's parties may cancel.
        if Self::classify(&stream, &caller) == Party::Outsider {
            return Err(ContractError::InvalidAddress);
        }

        let (recipient_share, sender_share) = Self::shares_at_now(&env, &stream);

        // CEI: drop the record before the external token transfers.
        delete_stream(&env, stream_id);

        let token_client = token::Client::new(&env, &stream.token);
        if recipient_share > 0 {
            token_client.transfer(
                &env.current_contract_address(),
                &stream.recipient,
                &recipient_share,
            );
        }
        if sender_share > 0 {
            token_client.transfer(
                &env.current_contract_address(),
                &stream.sender,
                &sender_share,
            );
        }

        env.events().publish(
            (symbol_short!("cancelled"), stream_id),
            (sender_share, recipient_share),
        );
        Ok(())
    }

    /// The id the next successful `create_stream` will be assigned. Starts at
    /// 1000 and only ever grows.
    pub fn next_stream_id(env: Env) -> u64 {
        next_id(&env)
    }
}
