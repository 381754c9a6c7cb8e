//! Engine constants. All timestamps and durations are in Unix milliseconds.

pub const SECOND_MS: u64 = 1_000;
pub const HOUR_MS: u64 = 60 * 60 * SECOND_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;

// --- Ledger ---

/// Points credited to a user the first time they vote.
pub const INITIAL_POINTS: u64 = 100;

/// Reputation of a user with no settled votes: `(0 + 1) / (0 + 2)`.
pub const INITIAL_REPUTATION: f64 = 0.5;

/// Smallest stake accepted on a single vote.
pub const MIN_STAKE: u64 = 1;

/// Largest stake accepted on a single vote.
pub const MAX_STAKE: u64 = 10;

/// Reward for a correct vote, as a percentage of the stake (floored, minimum 1 point).
pub const CORRECT_REWARD_PERCENT: u64 = 20;

/// Point balance at which direct-vote credibility reaches 1.0.
///
/// `credibility = ln(1 + points) / ln(1 + CREDIBILITY_SATURATION_POINTS)`.
pub const CREDIBILITY_SATURATION_POINTS: u64 = 10_000;

// --- Scoring ---

/// Beta prior for supporting belief.
pub const PRIOR_ALPHA: f64 = 1.0;

/// Beta prior for disputing belief.
pub const PRIOR_BETA: f64 = 1.0;

/// Trust score of a claim nobody has weighed in on.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Evidence quality used when an item has no prior votes.
pub const DEFAULT_EVIDENCE_QUALITY: f64 = 0.5;

// --- Resolution ---

/// Scores at or above this value count toward a Verified verdict.
pub const VERIFIED_THRESHOLD: f64 = 0.75;

/// Scores at or below this value count toward a Debunked verdict.
pub const DEBUNKED_THRESHOLD: f64 = 0.25;

/// How long a score must stay past a threshold before the claim resolves.
pub const RESOLUTION_DWELL_MS: u64 = 48 * HOUR_MS;

/// Age after which an undecided claim resolves as Inconclusive.
pub const INCONCLUSIVE_AGE_MS: u64 = 7 * DAY_MS;

// --- Bot / collusion detection ---

/// Two votes by one identity closer together than this are flagged as rapid voting.
pub const RAPID_VOTE_WINDOW_MS: u64 = 2 * SECOND_MS;

/// Number of recent vote timestamps kept per fingerprint.
pub const FINGERPRINT_HISTORY: usize = 5;

/// Upper bound on retained flag events per fingerprint (oldest evicted first).
pub const MAX_FLAG_EVENTS: usize = 32;

/// Shared votes required before a pair can be judged as colluding.
pub const COLLUSION_MIN_SHARED_VOTES: u64 = 10;

/// Agreement rate a pair must exceed to be flagged as colluding.
pub const COLLUSION_AGREEMENT_RATE: f64 = 0.9;

/// Weight multiplier applied to every future vote by a flagged colluder.
pub const COLLUSION_WEIGHT_MULTIPLIER: f64 = 0.1;

// --- Content ---

/// Maximum length (in characters) of claim and evidence text.
pub const MAX_CONTENT_LEN: usize = 2_000;

// --- Node ---

/// Default TCP port for the JSON-RPC server.
pub const DEFAULT_RPC_PORT: u16 = 18_640;

/// Default interval between resolution sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3_600;

/// Default caller-imposed timeout on a single engine call made over RPC.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;
