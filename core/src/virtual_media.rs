//! `VirtualMedia`: an in-memory [`MatchMedia`] environment.
//!
//! Holds a set of [`MediaFeatures`] (viewport size, pixel density, input
//! capabilities) and evaluates media descriptors against them. Mutating the
//! features re-evaluates every live query list and notifies those whose value
//! flipped, which is exactly the contract of a browser `matchMedia` list.
//!
//! The evaluator understands the subset of media query syntax the engine
//! produces and consumers commonly write:
//!
//! - comma-separated query lists (any query matching is enough)
//! - an optional `not` / `only` prefix per query
//! - `and`-joined media types (`all`, `screen`, `print`, ...) and features
//! - `(name)` and `(name: value)` features, with `min-` / `max-` ranges for
//!   `width`, `height`, `resolution` and `device-pixel-ratio`
//!
//! Anything it cannot parse evaluates to `false`.

use crate::{Listener, ListenerId, ListenerSet, MatchMedia, MediaQueryError, MediaQueryList};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// CSS reference pixel count of one `em` for the virtual viewport.
const EM_PX: f64 = 16.0;

/// Dots per inch of one CSS pixel at 1dppx.
const DPI_PER_DPPX: f64 = 96.0;

static AND_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").expect("valid regex"));

// ═══════════════════════════════════════════════════════════════════════════════
// Features
// ═══════════════════════════════════════════════════════════════════════════════

/// Primary pointing device accuracy (`pointer` media feature).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Pointer {
    /// Mouse, trackpad, stylus.
    #[default]
    Fine,
    /// Touch screen.
    Coarse,
    /// No pointing device.
    None,
}

impl Pointer {
    /// The CSS keyword for this pointer type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fine => "fine",
            Self::Coarse => "coarse",
            Self::None => "none",
        }
    }
}

/// Snapshot of the environment a [`VirtualMedia`] evaluates descriptors against.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct MediaFeatures {
    /// Viewport width in CSS pixels.
    pub width: f64,
    /// Viewport height in CSS pixels.
    pub height: f64,
    /// Device pixel ratio (dppx).
    pub resolution: f64,
    /// Whether the primary input can hover.
    pub hover: bool,
    /// Primary pointer accuracy.
    pub pointer: Pointer,
    /// Media type (`screen`, `print`, ...).
    pub media_type: String,
    /// Any other discrete feature, compared by exact value (e.g. `prefers-color-scheme`).
    pub extra: BTreeMap<String, String>,
}

impl Default for MediaFeatures {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            resolution: 1.0,
            hover: true,
            pointer: Pointer::Fine,
            media_type: "screen".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl MediaFeatures {
    /// Viewport of the given size, everything else default.
    #[must_use]
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// `portrait` when the viewport is at least as tall as it is wide.
    #[must_use]
    pub fn orientation(&self) -> &'static str {
        if self.height >= self.width {
            "portrait"
        } else {
            "landscape"
        }
    }

    /// Set a feature from its textual form, e.g. `("width", "900")`.
    ///
    /// Unknown names are stored in [`extra`](Self::extra).
    ///
    /// # Errors
    ///
    /// Returns [`MediaQueryError::InvalidFeature`] if the value cannot be
    /// parsed for a typed feature.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), MediaQueryError> {
        let invalid = || MediaQueryError::InvalidFeature {
            name: name.to_string(),
            value: value.to_string(),
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "width" => self.width = parse_length(value).ok_or_else(invalid)?,
            "height" => self.height = parse_length(value).ok_or_else(invalid)?,
            "resolution" | "dpr" | "device-pixel-ratio" => {
                self.resolution = parse_resolution(value).ok_or_else(invalid)?;
            }
            "hover" => {
                self.hover = match value.to_ascii_lowercase().as_str() {
                    "hover" | "true" | "1" => true,
                    "none" | "false" | "0" => false,
                    _ => return Err(invalid()),
                }
            }
            "pointer" => {
                self.pointer = match value.to_ascii_lowercase().as_str() {
                    "fine" => Pointer::Fine,
                    "coarse" => Pointer::Coarse,
                    "none" => Pointer::None,
                    _ => return Err(invalid()),
                }
            }
            "type" | "media-type" => self.media_type = value.to_ascii_lowercase(),
            _ => {
                self.extra.insert(name, value.to_ascii_lowercase());
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Descriptor evaluation
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Range {
    Min,
    Max,
    Exact,
}

#[derive(Debug, Clone)]
enum Part {
    Type(String),
    Feature { name: String, value: Option<String> },
    Invalid,
}

#[derive(Debug, Clone)]
struct Query {
    negated: bool,
    parts: Vec<Part>,
}

/// A parsed media query list. Parsed once per list, evaluated on every read.
#[derive(Debug, Clone)]
struct MediaQueryExpr {
    queries: Vec<Query>,
}

impl MediaQueryExpr {
    fn parse(descriptor: &str) -> Self {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            // An empty media query list matches everything.
            return Self {
                queries: vec![Query {
                    negated: false,
                    parts: vec![Part::Type("all".into())],
                }],
            };
        }
        Self {
            queries: descriptor.split(',').map(parse_query).collect(),
        }
    }

    fn evaluate(&self, features: &MediaFeatures) -> bool {
        self.queries.iter().any(|q| {
            let matched = q.parts.iter().all(|part| evaluate_part(part, features));
            matched != q.negated
        })
    }
}

fn parse_query(query: &str) -> Query {
    let lower = query.trim().to_ascii_lowercase();
    let (negated, rest) = if let Some(rest) = lower.strip_prefix("not ") {
        (true, rest.trim_start())
    } else if let Some(rest) = lower.strip_prefix("only ") {
        (false, rest.trim_start())
    } else {
        (false, lower.as_str())
    };
    let parts = if rest.is_empty() {
        vec![Part::Invalid]
    } else {
        AND_SPLIT.split(rest).map(parse_part).collect()
    };
    Query { negated, parts }
}

fn parse_part(part: &str) -> Part {
    let part = part.trim();
    if let Some(inner) = part.strip_prefix('(').and_then(|p| p.strip_suffix(')')) {
        let (name, value) = match inner.split_once(':') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            return Part::Invalid;
        }
        return Part::Feature {
            name: name.to_string(),
            value,
        };
    }
    if !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Part::Type(part.to_string());
    }
    Part::Invalid
}

fn evaluate_part(part: &Part, features: &MediaFeatures) -> bool {
    match part {
        Part::Type(t) => t == "all" || *t == features.media_type,
        Part::Feature { name, value } => evaluate_feature(name, value.as_deref(), features),
        Part::Invalid => false,
    }
}

fn evaluate_feature(name: &str, value: Option<&str>, features: &MediaFeatures) -> bool {
    let name = name.strip_prefix("-webkit-").unwrap_or(name);
    let (range, base) = if let Some(base) = name.strip_prefix("min-") {
        (Range::Min, base)
    } else if let Some(base) = name.strip_prefix("max-") {
        (Range::Max, base)
    } else {
        (Range::Exact, name)
    };

    match base {
        "width" => compare(range, features.width, value, parse_length),
        "height" => compare(range, features.height, value, parse_length),
        "resolution" => compare(range, features.resolution, value, parse_resolution),
        "device-pixel-ratio" => compare(range, features.resolution, value, parse_number),
        "orientation" if range == Range::Exact => {
            value.map_or(true, |v| v == features.orientation())
        }
        "hover" | "any-hover" if range == Range::Exact => match value {
            None | Some("hover") => features.hover,
            Some("none") => !features.hover,
            Some(_) => false,
        },
        "pointer" | "any-pointer" if range == Range::Exact => match value {
            None => features.pointer != Pointer::None,
            Some(v) => v == features.pointer.as_str(),
        },
        other if range == Range::Exact => match (features.extra.get(other), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(actual), None) => actual != "none" && actual != "0",
            (None, _) => false,
        },
        _ => false,
    }
}

fn compare(
    range: Range,
    actual: f64,
    value: Option<&str>,
    parse: fn(&str) -> Option<f64>,
) -> bool {
    let Some(value) = value else {
        // Boolean context: `(width)` is true for any non-zero width.
        return range == Range::Exact && actual != 0.0;
    };
    let Some(expected) = parse(value) else {
        return false;
    };
    match range {
        Range::Min => actual >= expected,
        Range::Max => actual <= expected,
        Range::Exact => (actual - expected).abs() < f64::EPSILON,
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(px) = value.strip_suffix("px") {
        parse_number(px)
    } else if let Some(rem) = value.strip_suffix("rem") {
        parse_number(rem).map(|v| v * EM_PX)
    } else if let Some(em) = value.strip_suffix("em") {
        parse_number(em).map(|v| v * EM_PX)
    } else {
        parse_number(&value)
    }
}

fn parse_resolution(value: &str) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(dppx) = value.strip_suffix("dppx") {
        parse_number(dppx)
    } else if let Some(dpi) = value.strip_suffix("dpi") {
        parse_number(dpi).map(|v| v / DPI_PER_DPPX)
    } else if let Some(dpcm) = value.strip_suffix("dpcm") {
        parse_number(dpcm).map(|v| v * 2.54 / DPI_PER_DPPX)
    } else if let Some(x) = value.strip_suffix('x') {
        parse_number(x)
    } else {
        parse_number(&value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Environment
// ═══════════════════════════════════════════════════════════════════════════════

struct VirtualInner {
    features: RefCell<MediaFeatures>,
    lists: RefCell<Vec<Weak<VirtualQueryList>>>,
}

/// In-memory [`MatchMedia`] environment.
///
/// Cheap to clone: clones share the same feature state and query lists.
///
/// # Example
///
/// ```
/// use mediq::{MatchMedia, MediaFeatures, VirtualMedia};
///
/// let media = VirtualMedia::new(MediaFeatures::with_size(900.0, 600.0));
/// let list = media.match_media("(min-width: 800px)");
/// assert!(list.matches());
///
/// media.set_width(700.0);
/// assert!(!list.matches());
/// ```
#[derive(Clone)]
pub struct VirtualMedia {
    inner: Rc<VirtualInner>,
}

impl VirtualMedia {
    /// Create an environment with the given features.
    #[must_use]
    pub fn new(features: MediaFeatures) -> Self {
        Self {
            inner: Rc::new(VirtualInner {
                features: RefCell::new(features),
                lists: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Snapshot of the current features.
    #[must_use]
    pub fn features(&self) -> MediaFeatures {
        self.inner.features.borrow().clone()
    }

    /// Evaluate a descriptor once, without creating a live list.
    #[must_use]
    pub fn evaluate(&self, descriptor: &str) -> bool {
        MediaQueryExpr::parse(descriptor).evaluate(&self.inner.features.borrow())
    }

    /// Mutate the features, then notify every list whose value changed.
    pub fn update(&self, mutate: impl FnOnce(&mut MediaFeatures)) {
        mutate(&mut self.inner.features.borrow_mut());
        self.refresh();
    }

    /// Resize the viewport width.
    pub fn set_width(&self, width: f64) {
        self.update(|f| f.width = width);
    }

    /// Resize the viewport height.
    pub fn set_height(&self, height: f64) {
        self.update(|f| f.height = height);
    }

    /// Resize the viewport.
    pub fn set_size(&self, width: f64, height: f64) {
        self.update(|f| {
            f.width = width;
            f.height = height;
        });
    }

    /// Change the device pixel ratio.
    pub fn set_resolution(&self, dppx: f64) {
        self.update(|f| f.resolution = dppx);
    }

    /// Set a feature from its textual form. See [`MediaFeatures::set`].
    ///
    /// # Errors
    ///
    /// Returns [`MediaQueryError::InvalidFeature`] for unparseable typed values.
    pub fn set_feature(&self, name: &str, value: &str) -> Result<(), MediaQueryError> {
        self.inner.features.borrow_mut().set(name, value)?;
        self.refresh();
        Ok(())
    }

    /// Number of query lists still alive.
    #[must_use]
    pub fn live_lists(&self) -> usize {
        self.inner
            .lists
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Total number of listeners attached across all live lists.
    ///
    /// This is the "native subscription" count the engine is expected to keep
    /// at zero while nobody observes its conditions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.live()
            .iter()
            .map(|list| list.listeners.len())
            .sum()
    }

    fn live(&self) -> Vec<Rc<VirtualQueryList>> {
        let mut lists = self.inner.lists.borrow_mut();
        lists.retain(|w| w.strong_count() > 0);
        lists.iter().filter_map(Weak::upgrade).collect()
    }

    fn refresh(&self) {
        let lists = self.live();
        let changed: Vec<(Rc<VirtualQueryList>, bool)> = {
            let features = self.inner.features.borrow();
            lists
                .into_iter()
                .filter_map(|list| {
                    let now = list.expr.evaluate(&features);
                    (now != list.last.get()).then(|| {
                        list.last.set(now);
                        (list, now)
                    })
                })
                .collect()
        };
        tracing::trace!(changed = changed.len(), "virtual media refreshed");
        for (list, now) in changed {
            // A listener may have mutated the environment; a nested refresh
            // already delivered the newer value.
            if list.last.get() != now {
                continue;
            }
            list.listeners.dispatch(&now);
        }
    }
}

impl Default for VirtualMedia {
    fn default() -> Self {
        Self::new(MediaFeatures::default())
    }
}

impl fmt::Debug for VirtualMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMedia")
            .field("features", &*self.inner.features.borrow())
            .field("live_lists", &self.live_lists())
            .finish()
    }
}

impl MatchMedia for VirtualMedia {
    fn match_media(&self, descriptor: &str) -> Rc<dyn MediaQueryList> {
        let expr = MediaQueryExpr::parse(descriptor);
        let initial = expr.evaluate(&self.inner.features.borrow());
        let list = Rc::new(VirtualQueryList {
            media: descriptor.to_string(),
            expr,
            env: Rc::downgrade(&self.inner),
            last: Cell::new(initial),
            listeners: ListenerSet::new(),
        });
        let mut lists = self.inner.lists.borrow_mut();
        lists.retain(|w| w.strong_count() > 0);
        lists.push(Rc::downgrade(&list));
        list
    }
}

/// A live query list created by [`VirtualMedia`].
pub struct VirtualQueryList {
    media: String,
    expr: MediaQueryExpr,
    env: Weak<VirtualInner>,
    last: Cell<bool>,
    listeners: ListenerSet<bool>,
}

impl MediaQueryList for VirtualQueryList {
    fn media(&self) -> &str {
        &self.media
    }

    fn matches(&self) -> bool {
        match self.env.upgrade() {
            Some(env) => self.expr.evaluate(&env.features.borrow()),
            None => self.last.get(),
        }
    }

    fn add_listener(&self, listener: Listener<bool>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl fmt::Debug for VirtualQueryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualQueryList")
            .field("media", &self.media)
            .field("matches", &self.matches())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
