//! Test doubles shared by the module tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::api::Fetcher;
use crate::error::{ArchiveError, Result};
use crate::models::CaptureRecord;

/// Scripted [`Fetcher`]: answers from a URL -> response table and records
/// every URL it was asked for.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    responses: HashMap<String, std::result::Result<Vec<u8>, String>>,
    calls: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn fail(mut self, url: impl Into<String>, reason: &str) -> Self {
        self.responses.insert(url.into(), Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.borrow_mut().push(url.to_string());
        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(reason)) => Err(ArchiveError::remote(url, reason)),
            None => Err(ArchiveError::remote(url, "HTTP 404 Not Found")),
        }
    }
}

/// An unscraped capture of `https://twitter.com/notch/status/<status_id>`.
pub fn capture(digest: &str, status_id: u64) -> CaptureRecord {
    CaptureRecord {
        url_key: format!("com,twitter)/notch/status/{status_id}"),
        timestamp: 20200101000000,
        original_url: format!("https://twitter.com/notch/status/{status_id}"),
        mimetype: "text/html".to_string(),
        status_code: Some(200),
        digest: digest.to_string(),
        length: Some(1234),
        author: None,
        text: None,
    }
}

/// A legacy permalink page the way the Wayback Machine replays it.
pub fn permalink_page(author: &str, text: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><title>Twitter</title></head>
<body>
  <div id="wm-ipp-base">Wayback toolbar</div>
  <div class="permalink-container permalink-container--withArrows">
    <div class="tweet permalink-tweet js-actionable-user js-original-tweet" data-tweet-id="1">
      <div class="content clearfix">
        <div class="permalink-header">
          <a class="account-group js-account-group" href="/notch">
            <strong class="fullname show-popup-with-id">Markus Persson</strong>
            <span class="username u-dir" dir="ltr"><s>@</s><b>{author}</b></span>
          </a>
        </div>
      </div>
      <div class="js-tweet-text-container">
        <p class="TweetTextSize TweetTextSize--jumbo js-tweet-text tweet-text">{text}</p>
      </div>
    </div>
  </div>
</body></html>"#
    )
}
