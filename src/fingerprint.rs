//! Browser-like request headers for asset downloads
//!
//! Some image and audio hosts refuse clients that don't look like a browser,
//! so downloads carry a realistic User-Agent and Accept set.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// (major, full) Chrome versions
const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("131", "131.0.6778.86"),
    ("132", "132.0.6834.110"),
    ("133", "133.0.6943.54"),
];

const FIREFOX_VERSIONS: &[&str] = &["133.0", "134.0", "135.0"];

/// (version, webkit) Safari versions
const SAFARI_VERSIONS: &[(&str, &str)] = &[("17.6", "605.1.15"), ("18.2", "605.1.15")];

/// Accept header for media downloads (images and audio, anything as fallback)
const MEDIA_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,audio/*;q=0.9,*/*;q=0.8";

/// Header set presented to asset hosts
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

#[derive(Debug, Clone, Copy)]
enum Platform {
    MacOS,
    Windows,
    Linux,
}

impl Platform {
    fn random() -> Self {
        let mut rng = rand::thread_rng();
        // Windows 65%, macOS 20%, Linux 15%
        let roll: f32 = rng.gen();
        if roll < 0.65 {
            Platform::Windows
        } else if roll < 0.85 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::Linux => "X11; Linux x86_64",
        }
    }
}

/// Chrome on a random desktop platform
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let (_, full) = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(("133", "133.0.6943.54"));

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
            Platform::random().os_string()
        ),
        accept: MEDIA_ACCEPT.to_string(),
        accept_language: random_accept_language(),
    }
}

/// Firefox on a random desktop platform
#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let version = FIREFOX_VERSIONS.choose(&mut rng).copied().unwrap_or("135.0");

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
            Platform::random().os_string()
        ),
        accept: MEDIA_ACCEPT.to_string(),
        accept_language: random_accept_language(),
    }
}

/// Safari on macOS
#[must_use]
pub fn safari_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let (version, webkit) = SAFARI_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(("18.2", "605.1.15"));

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/{webkit} (KHTML, like Gecko) Version/{version} Safari/{webkit}"
        ),
        accept: MEDIA_ACCEPT.to_string(),
        accept_language: random_accept_language(),
    }
}

/// Random profile weighted by market share
#[must_use]
pub fn random_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    // Chrome 65%, Safari 20%, Firefox 15%
    let roll: f32 = rng.gen();
    if roll < 0.65 {
        chrome_profile()
    } else if roll < 0.85 {
        safari_profile()
    } else {
        firefox_profile()
    }
}

fn random_accept_language() -> String {
    let mut rng = rand::thread_rng();
    let languages = [
        "en-US,en;q=0.9",
        "en-GB,en;q=0.9",
        "en-US,en;q=0.9,pt-BR;q=0.8",
        "pt-BR,pt;q=0.9,en;q=0.8",
        "en-US,en;q=0.9,es;q=0.8",
    ];
    languages
        .choose(&mut rng)
        .copied()
        .unwrap_or("en-US,en;q=0.9")
        .to_string()
}

impl BrowserProfile {
    /// Convert profile to reqwest `HeaderMap`
    ///
    /// Values that are not valid header text are left out.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (USER_AGENT, &self.user_agent),
            (ACCEPT, &self.accept),
            (ACCEPT_LANGUAGE, &self.accept_language),
        ] {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}
