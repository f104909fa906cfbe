// [libs/core/state-store/src/scripts.rs]
//! The two fixed atomic scripts C3 is required to expose. Kept as
//! string constants rather than assembled at runtime: the exact
//! semantics below are the contract, not an implementation detail.

/// `KEYS[1]` budget counter, `KEYS[2]` idempotency marker (value is the
/// cost charged), `KEYS[3]` headroom counter.
/// `ARGV[1]` cost (non-negative decimal integer string), `ARGV[2]`
/// idempotency TTL in seconds (24h), `ARGV[3]` reconciliation status
/// (`"FAIL_OPEN"` or anything else).
///
/// (i) idempotency key exists ⇒ `{"duplicate", cached_cost}`; (ii)
/// otherwise increment the budget counter and set the idempotency key
/// with TTL; (iii) `FAIL_OPEN` reconciliation also decrements the
/// headroom counter; (iv) `{"new", new_budget}`.
pub const ATOMIC_COST_COMMIT_SCRIPT: &str = r#"
local existing = redis.call('GET', KEYS[2])
if existing then
return {'duplicate', existing}
end
local new_budget = redis.call('INCRBY', KEYS[1], ARGV[1])
redis.call('SET', KEYS[2], ARGV[1], 'EX', ARGV[2])
if ARGV[3] == 'FAIL_OPEN' then
redis.call('DECRBY', KEYS[3], ARGV[1])
end
return {'new', tostring(new_budget)}
"#;

/// `KEYS[1]` challenge key, `KEYS[2]` consumed marker, `KEYS[3]` replay
/// key. `ARGV[1]` replay TTL in seconds, `ARGV[2]` tx hash.
///
/// (i) challenge absent ⇒ `NONCE_NOT_FOUND`; (ii) consumed marker
/// present ⇒ `RACE_LOST`; (iii) replay key present ⇒ `REPLAY_DETECTED`;
/// (iv) set consumed marker and replay key with TTL, delete the
/// challenge, return `SUCCESS`.
pub const ATOMIC_VERIFY_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
return {'NONCE_NOT_FOUND'}
end
if redis.call('EXISTS', KEYS[2]) == 1 then
return {'RACE_LOST'}
end
if redis.call('EXISTS', KEYS[3]) == 1 then
return {'REPLAY_DETECTED'}
end
redis.call('SET', KEYS[2], '1')
redis.call('SET', KEYS[3], ARGV[2], 'EX', ARGV[1])
redis.call('DEL', KEYS[1])
return {'SUCCESS'}
"#;

/// `KEYS[1]` the RPM sorted set for one (provider, model) pair.
/// `ARGV[1]` now, in milliseconds since epoch. `ARGV[2]` window in
/// milliseconds (60000). `ARGV[3]` limit. `ARGV[4]` a fresh unique
/// member id for this request. `ARGV[5]` TTL seconds to apply to the
/// set (window + slack), so an idle (provider, model) pair's key
/// eventually expires instead of persisting forever.
///
/// Prunes members older than the window, then admits iff the pruned
/// cardinality is still below `limit`.
pub const RPM_ADMIT_SCRIPT: &str = r#"
local cutoff = tonumber(ARGV[1]) - tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', cutoff)
local count = redis.call('ZCARD', KEYS[1])
if count < tonumber(ARGV[3]) then
redis.call('ZADD', KEYS[1], ARGV[1], ARGV[4])
redis.call('EXPIRE', KEYS[1], ARGV[5])
return {'admitted'}
end
return {'denied'}
"#;

/// `KEYS[1]` current-minute token hash, `KEYS[2]` previous-minute token
/// hash. `ARGV[1]` tokens being admitted. `ARGV[2]` elapsed fraction of
/// the current minute (`0.0..1.0`, as a decimal string). `ARGV[3]`
/// limit. `ARGV[4]` the current-minute bucket field to increment.
/// `ARGV[5]` TTL seconds applied to the current-minute hash (120s, so a
/// bucket outlives being read as "previous" once before expiring).
///
/// `effective = sum(previous) * (1 - elapsed) + sum(current)`; admits
/// iff `effective + tokens <= limit`.
pub const TPM_ADMIT_SCRIPT: &str = r#"
local function bucket_sum(key)
local all = redis.call('HGETALL', key)
local total = 0
for i = 2, #all, 2 do
total = total + tonumber(all[i])
end
return total
end
local previous_sum = bucket_sum(KEYS[2])
local current_sum = bucket_sum(KEYS[1])
local elapsed = tonumber(ARGV[2])
local effective = previous_sum * (1 - elapsed) + current_sum
local tokens = tonumber(ARGV[1])
if effective + tokens <= tonumber(ARGV[3]) then
redis.call('HINCRBY', KEYS[1], ARGV[4], tokens)
redis.call('EXPIRE', KEYS[1], ARGV[5])
return {'admitted'}
end
return {'denied'}
"#;
