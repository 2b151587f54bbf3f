//! User agent based device detection.

use once_cell::sync::Lazy;
use regex::Regex;

static BOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)chrome-lighthouse|google page speed insights|bot|crawl|spider|slurp")
        .expect("valid regex")
});
static MOBILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)android|webos|iphone|ipad|ipod|blackberry|iemobile|opera mini")
        .expect("valid regex")
});
static ANDROID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)android").expect("valid regex"));
static IOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"iPad|iPhone|iPod").expect("valid regex"));
static IE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Trident/|MSIE ").expect("valid regex"));
static EDGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Edg(e|A|iOS)?/").expect("valid regex"));
static BLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(chrome|chromium|crios|opr)/").expect("valid regex"));
static GECKO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bgecko/\d").expect("valid regex"));
static WEBKIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)applewebkit/").expect("valid regex"));
static SAFARI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)safari/").expect("valid regex"));
static NOT_SAFARI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)chrome|chromium|crios|fxios|android|edg").expect("valid regex")
});

/// Device and browser flags feeding the environment shortcuts.
///
/// Everything except `touch` is derived from the user agent string; touch
/// support cannot be read from a UA and is set explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// The user agent the flags were derived from.
    pub user_agent: String,
    /// Crawler or automated agent.
    pub bot: bool,
    /// Phone or tablet.
    pub mobile: bool,
    /// Android device.
    pub android: bool,
    /// iPhone, iPad or iPod.
    pub ios: bool,
    /// Touch input available.
    pub touch: bool,
    /// Blink engine (Chrome, Chromium, Opera, new Edge).
    pub blink: bool,
    /// Edge browser.
    pub edge: bool,
    /// Gecko engine (Firefox).
    pub gecko: bool,
    /// Desktop or mobile Safari.
    pub safari: bool,
    /// WebKit-derived engine.
    pub webkit: bool,
    /// Internet Explorer.
    pub ie: bool,
}

impl DeviceInfo {
    /// Detect flags from a user agent string.
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent;
        Self {
            user_agent: ua.to_string(),
            bot: BOT.is_match(ua),
            mobile: MOBILE.is_match(ua),
            android: ANDROID.is_match(ua),
            ios: IOS.is_match(ua),
            touch: false,
            blink: BLINK.is_match(ua),
            edge: EDGE.is_match(ua),
            gecko: GECKO.is_match(ua),
            safari: SAFARI.is_match(ua) && !NOT_SAFARI.is_match(ua),
            webkit: WEBKIT.is_match(ua),
            ie: IE.is_match(ua),
        }
    }

    /// Set touch support (builder pattern).
    #[must_use]
    pub fn with_touch(mut self, touch: bool) -> Self {
        self.touch = touch;
        self
    }
}
