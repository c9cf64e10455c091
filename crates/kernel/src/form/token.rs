//! Form tamper protection.
//!
//! A [`FieldTokenGuard`] records every field rendered into one form, splits
//! them into locked and unlocked names, and produces the `_Token[...]` hidden
//! fields. On submission the same scheme is recomputed from the posted data
//! and compared against the embedded digest.
//!
//! Canonical digest input, in order:
//! 1. the form URL reduced to path and query,
//! 2. the locked entries as a JSON array: plain names sorted bytewise, then
//!    `[name, value]` pairs sorted by name,
//! 3. the unlocked names, de-duplicated, sorted and joined with `|`,
//! 4. the session identifier.
//!
//! The digest is hex-encoded HMAC-SHA256 keyed with the configured salt.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::error::HelperResult;

use super::field::{FieldName, covers};

type HmacSha256 = Hmac<Sha256>;

/// Hidden field carrying the digest and the value-bearing field names.
pub const TOKEN_FIELDS: &str = "_Token[fields]";

/// Hidden field carrying the unlocked field names.
pub const TOKEN_UNLOCKED: &str = "_Token[unlocked]";

/// Hidden field carrying the debug payload.
pub const TOKEN_DEBUG: &str = "_Token[debug]";

/// Root segment shared by the token fields.
const TOKEN_ROOT: &str = "_Token";

/// Length of a hex-encoded SHA-256 MAC.
const DIGEST_HEX_LEN: usize = 64;

/// How a field is registered with the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOptions {
    /// Locked fields must come back unmodified; `false` unlocks the field.
    pub lock: bool,
    /// Static value of a hidden field, folded into the digest.
    pub value: Option<String>,
    /// Disabled inputs are never submitted and are not tracked.
    pub disabled: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            lock: true,
            value: None,
            disabled: false,
        }
    }
}

impl FieldOptions {
    pub fn locked() -> Self {
        Self::default()
    }

    pub fn unlocked() -> Self {
        Self {
            lock: false,
            ..Self::default()
        }
    }

    /// A locked hidden field whose value must not change.
    pub fn hidden(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Request-time inputs to digest construction.
#[derive(Debug, Clone)]
pub struct TokenContext {
    /// URL the form submits to. Scheme and host are stripped.
    pub url: String,
    /// Identifier of the current session.
    pub session_id: String,
    /// Whether to emit `_Token[debug]`. Read at build time, not construction.
    pub debug: bool,
}

impl TokenContext {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
            debug: false,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// The hidden-field values produced for one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormToken {
    /// Hex digest.
    pub digest: String,
    /// URL-encoded `digest:name|name` for `_Token[fields]`.
    pub fields: String,
    /// URL-encoded pipe-joined unlocked names for `_Token[unlocked]`.
    pub unlocked: String,
    /// URL-encoded JSON debug payload for `_Token[debug]`.
    pub debug: Option<String>,
}

impl FormToken {
    /// Hidden-field name/value pairs in emission order.
    pub fn hidden_fields(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![
            (TOKEN_FIELDS, self.fields.as_str()),
            (TOKEN_UNLOCKED, self.unlocked.as_str()),
        ];
        if let Some(debug) = &self.debug {
            out.push((TOKEN_DEBUG, debug.as_str()));
        }
        out
    }
}

/// Why a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// `_Token[fields]` was not submitted.
    MissingToken,
    /// `_Token[fields]` or `_Token[unlocked]` could not be decoded.
    MalformedToken,
    /// Locked fields were submitted without `_Token[unlocked]`.
    MissingUnlocked,
    /// A submitted name could not be normalized.
    InvalidFieldName(String),
    /// A locked field from the rendered form was not submitted.
    MissingField(String),
    /// A field that was not rendered as locked was submitted.
    UnexpectedField(String),
    /// A hidden field came back with a different value.
    TamperedValue(String),
    /// The submission was posted to a different URL.
    UrlMismatch { expected: String, actual: String },
    /// The digest did not match and no finer reason could be given.
    DigestMismatch,
}

/// Outcome of verifying a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Rejected(Vec<Rejection>),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }

    fn rejected(reason: Rejection) -> Self {
        Verification::Rejected(vec![reason])
    }
}

/// Raw submitted form data: decoded name/value pairs in posting order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedData {
    pairs: Vec<(String, String)>,
}

impl SubmittedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &str) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Replace every pair with this name, or append one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.pairs.retain(|(n, _)| n != name);
        self.pairs.push((name.to_string(), value));
    }

    pub fn remove(&mut self, name: &str) {
        self.pairs.retain(|(n, _)| n != name);
    }

    /// First value submitted under `name`, in either bracket or dot spelling.
    pub fn get(&self, name: &str) -> Option<&str> {
        let wanted = FieldName::parse(name).ok()?.path();
        self.pairs
            .iter()
            .find(|(n, _)| FieldName::parse(n).is_ok_and(|f| f.path() == wanted))
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubmittedData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One locked field as recorded during rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockedField {
    name: String,
    value: Option<String>,
}

/// Tracks the fields of one form and produces or checks its token.
#[derive(Debug, Clone)]
pub struct FieldTokenGuard {
    config: GuardConfig,
    locked: Vec<LockedField>,
    unlocked: Vec<String>,
}

impl FieldTokenGuard {
    /// Create a guard for one form. Names in `config.unlocked_fields` that
    /// cannot be normalized are ignored with a warning.
    pub fn new(config: GuardConfig) -> Self {
        let mut guard = Self {
            config,
            locked: Vec::new(),
            unlocked: Vec::new(),
        };
        for name in guard.config.unlocked_fields.clone() {
            if let Err(e) = guard.unlock_field(&name) {
                warn!(error = %e, "ignoring configured unlocked field");
            }
        }
        guard
    }

    /// Record a rendered field.
    ///
    /// Locked names covered by an unlocked name are ignored, so an unlock
    /// always outlives later locked registrations. Re-registering a locked
    /// name replaces the earlier entry.
    ///
    /// Plain fields are tracked by group, so `Tags.0` and `Tags.1` register
    /// once as `Tags`. Fields carrying a value keep their full path.
    pub fn register_field(&mut self, name: &str, options: FieldOptions) -> HelperResult<()> {
        let field = FieldName::parse(name)?;
        if options.disabled {
            return Ok(());
        }

        if !options.lock {
            self.unlock_normalized(field.group());
            return Ok(());
        }
        let key = match options.value {
            Some(_) => field.path(),
            None => field.group(),
        };
        if self.unlocked.iter().any(|off| covers(off, &key)) {
            return Ok(());
        }

        self.locked.retain(|f| f.name != key);
        self.locked.push(LockedField {
            name: key,
            value: options.value,
        });
        Ok(())
    }

    /// Exclude a field from tamper checking. Idempotent.
    pub fn unlock_field(&mut self, name: &str) -> HelperResult<()> {
        let field = FieldName::parse(name)?;
        self.unlock_normalized(field.path());
        Ok(())
    }

    fn unlock_normalized(&mut self, name: String) {
        self.locked.retain(|f| f.name != name);
        if !self.unlocked.contains(&name) {
            self.unlocked.push(name);
        }
    }

    /// Locked field names in registration order.
    pub fn locked_fields(&self) -> Vec<&str> {
        self.locked.iter().map(|f| f.name.as_str()).collect()
    }

    /// Value registered for a locked field, if it carries one.
    pub fn locked_value(&self, name: &str) -> Option<&str> {
        self.locked
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_deref())
    }

    /// Unlocked field names in registration order.
    pub fn unlocked_fields(&self) -> &[String] {
        &self.unlocked
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.locked.iter().any(|f| f.name == name)
    }

    /// Build the token for the fields recorded so far.
    ///
    /// `extra_unlocked` names (for example additional submit buttons) are
    /// unlocked for this token only.
    pub fn build_digest(
        &self,
        ctx: &TokenContext,
        extra_unlocked: &[&str],
    ) -> HelperResult<FormToken> {
        let mut unlocked = self.unlocked.clone();
        for name in extra_unlocked {
            unlocked.push(FieldName::parse(name)?.path());
        }
        let unlocked = sorted_unique(unlocked);

        let locked: Vec<(String, Option<String>)> = self
            .locked
            .iter()
            .filter(|f| !unlocked.iter().any(|off| covers(off, &f.name)))
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect();
        let entries = canonical_entries(locked);

        let url = canonical_url(&ctx.url);
        let unlocked_joined = unlocked.join("|");
        let digest = self.compute_digest(&url, &entries, &unlocked_joined, &ctx.session_id);

        let valued: Vec<&str> = entries
            .iter()
            .filter_map(|e| match e {
                Entry::Valued(name, _) => Some(name.as_str()),
                Entry::Plain(_) => None,
            })
            .collect();
        let fields = format!("{digest}:{}", valued.join("|"));

        let debug_payload = ctx.debug.then(|| {
            let payload = Value::Array(vec![
                Value::String(url.clone()),
                entries_json(&entries),
                Value::Array(unlocked.iter().cloned().map(Value::String).collect()),
            ]);
            urlencoding::encode(&payload.to_string()).into_owned()
        });

        debug!(
            url = %url,
            locked = entries.len(),
            unlocked = unlocked.len(),
            debug = ctx.debug,
            "built form token"
        );

        Ok(FormToken {
            fields: urlencoding::encode(&fields).into_owned(),
            unlocked: urlencoding::encode(&unlocked_joined).into_owned(),
            debug: debug_payload,
            digest,
        })
    }

    /// Check a submission against the token embedded in it.
    ///
    /// Never errors: anything missing or malformed rejects the submission.
    pub fn verify(&self, submitted: &SubmittedData, url: &str, session_id: &str) -> bool {
        self.verify_detailed(submitted, url, session_id).is_valid()
    }

    /// Like [`verify`](Self::verify), reporting why a submission was rejected.
    pub fn verify_detailed(
        &self,
        submitted: &SubmittedData,
        url: &str,
        session_id: &str,
    ) -> Verification {
        let outcome = self.check(submitted, url, session_id);
        if let Verification::Rejected(reasons) = &outcome {
            warn!(url = %url, reasons = reasons.len(), "form token rejected");
        }
        outcome
    }

    fn check(&self, submitted: &SubmittedData, url: &str, session_id: &str) -> Verification {
        let Some(raw_fields) = submitted.get(TOKEN_FIELDS) else {
            return Verification::rejected(Rejection::MissingToken);
        };
        let Ok(token) = urlencoding::decode(raw_fields) else {
            return Verification::rejected(Rejection::MalformedToken);
        };
        let (digest, valued_part) = token.split_once(':').unwrap_or((&*token, ""));
        if !is_digest(digest) {
            return Verification::rejected(Rejection::MalformedToken);
        }
        let valued_names = split_pipe(valued_part);

        let raw_unlocked = submitted.get(TOKEN_UNLOCKED);
        let transported = match raw_unlocked.map(urlencoding::decode) {
            Some(Ok(list)) => split_pipe(&list),
            Some(Err(_)) => return Verification::rejected(Rejection::MalformedToken),
            None => Vec::new(),
        };
        let unlocked = sorted_unique(transported);

        // Multi-value inputs collapse onto their group. Value-bearing fields
        // are keyed by full path and must be submitted exactly once.
        let mut groups: Vec<(String, String, usize)> = Vec::new();
        for (name, value) in submitted.pairs() {
            let field = match FieldName::parse(name) {
                Ok(field) => field,
                Err(_) => {
                    return Verification::rejected(Rejection::InvalidFieldName(name.clone()));
                }
            };
            if field.segments().first().is_some_and(|s| s == TOKEN_ROOT) {
                continue;
            }
            let path = field.path();
            let key = if valued_names.contains(&path) {
                path
            } else {
                field.group()
            };
            match groups.iter_mut().find(|(k, _, _)| *k == key) {
                Some((_, _, count)) => *count += 1,
                None => groups.push((key, value.clone(), 1)),
            }
        }

        let mut locked: Vec<(String, Option<String>)> = Vec::new();
        for (name, value, count) in groups {
            let covered = unlocked
                .iter()
                .chain(self.unlocked.iter())
                .any(|off| covers(off, &name));
            if covered {
                continue;
            }
            if valued_names.contains(&name) {
                if count > 1 {
                    return Verification::rejected(Rejection::TamperedValue(name));
                }
                locked.push((name, Some(value)));
            } else {
                locked.push((name, None));
            }
        }

        if raw_unlocked.is_none() && !locked.is_empty() {
            return Verification::rejected(Rejection::MissingUnlocked);
        }

        let entries = canonical_entries(locked);
        let url = canonical_url(url);
        let expected = self.compute_digest(&url, &entries, &unlocked.join("|"), session_id);

        if bool::from(expected.as_bytes().ct_eq(digest.as_bytes())) {
            return Verification::Valid;
        }

        let mut reasons = submitted
            .get(TOKEN_DEBUG)
            .map(|raw| diagnose(raw, &url, &entries))
            .unwrap_or_default();
        if reasons.is_empty() {
            reasons.push(Rejection::DigestMismatch);
        }
        Verification::Rejected(reasons)
    }

    fn compute_digest(
        &self,
        url: &str,
        entries: &[Entry],
        unlocked_joined: &str,
        session_id: &str,
    ) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.salt.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(url.as_bytes());
        mac.update(entries_json(entries).to_string().as_bytes());
        mac.update(unlocked_joined.as_bytes());
        mac.update(session_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// A locked entry in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Plain(String),
    Valued(String, String),
}

/// Plain names sorted first, then value-bearing entries sorted by name.
fn canonical_entries(locked: Vec<(String, Option<String>)>) -> Vec<Entry> {
    let mut plain = Vec::new();
    let mut valued = Vec::new();
    for (name, value) in locked {
        match value {
            Some(value) => valued.push((name, value)),
            None => plain.push(name),
        }
    }
    plain.sort();
    plain.dedup();
    valued.sort_by(|a, b| a.0.cmp(&b.0));
    valued.dedup_by(|a, b| a.0 == b.0);

    plain
        .into_iter()
        .map(Entry::Plain)
        .chain(valued.into_iter().map(|(n, v)| Entry::Valued(n, v)))
        .collect()
}

fn entries_json(entries: &[Entry]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|e| match e {
                Entry::Plain(name) => Value::String(name.clone()),
                Entry::Valued(name, value) => Value::Array(vec![
                    Value::String(name.clone()),
                    Value::String(value.clone()),
                ]),
            })
            .collect(),
    )
}

fn entries_from_json(value: &Value) -> Option<Vec<Entry>> {
    value
        .as_array()?
        .iter()
        .map(|item| match item {
            Value::String(name) => Some(Entry::Plain(name.clone())),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(name), Value::String(value)] => {
                    Some(Entry::Valued(name.clone(), value.clone()))
                }
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Compare the submitted fields against the debug payload rendered with the form.
fn diagnose(raw_debug: &str, url: &str, actual: &[Entry]) -> Vec<Rejection> {
    let Ok(decoded) = urlencoding::decode(raw_debug) else {
        return Vec::new();
    };
    let Ok(Value::Array(payload)) = serde_json::from_str::<Value>(&decoded) else {
        return Vec::new();
    };
    let [Value::String(expected_url), expected_entries, _] = payload.as_slice() else {
        return Vec::new();
    };
    let Some(expected) = entries_from_json(expected_entries) else {
        return Vec::new();
    };

    let mut reasons = Vec::new();
    if expected_url != url {
        reasons.push(Rejection::UrlMismatch {
            expected: expected_url.clone(),
            actual: url.to_string(),
        });
    }

    let name_of = |e: &Entry| match e {
        Entry::Plain(n) | Entry::Valued(n, _) => n.clone(),
    };
    for entry in &expected {
        let name = name_of(entry);
        match actual.iter().find(|a| name_of(a) == name) {
            None => reasons.push(Rejection::MissingField(name)),
            Some(found) if found != entry => reasons.push(Rejection::TamperedValue(name)),
            Some(_) => {}
        }
    }
    for entry in actual {
        let name = name_of(entry);
        if !expected.iter().any(|e| name_of(e) == name) {
            reasons.push(Rejection::UnexpectedField(name));
        }
    }
    reasons
}

/// Reduce a URL to path and query.
pub fn canonical_url(raw: &str) -> String {
    if raw.is_empty() {
        return "/".to_string();
    }
    match url::Url::parse(raw) {
        Ok(parsed) if parsed.has_host() => {
            let mut out = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                out.push('?');
                out.push_str(query);
            }
            out
        }
        _ => raw.to_string(),
    }
}

fn sorted_unique(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

fn split_pipe(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split('|').map(str::to_string).collect()
}

fn is_digest(candidate: &str) -> bool {
    candidate.len() == DIGEST_HEX_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
