//! Route validation.
//!
//! Runs before any backend is constructed. Every route is checked even after
//! a failure, so the operator sees every duplicate prompt once.

use std::collections::HashSet;

use bup_models::{BackendKind, CdnConfig, MatchPattern, Route, RouteConfig};
use tracing::{debug, warn};

use crate::confirm::ConfirmPrompt;
use crate::error::{PublishError, PublishResult};
use crate::messages::{MessageId, Messages};

/// Validates route configurations against the supported backend set.
pub struct RouteValidator<'a> {
    messages: &'a Messages,
    prompt: &'a dyn ConfirmPrompt,
}

fn index_suffix(index: Option<usize>) -> String {
    index
        .map(|i| format!(" CDN index:{}", i))
        .unwrap_or_default()
}

impl<'a> RouteValidator<'a> {
    pub fn new(messages: &'a Messages, prompt: &'a dyn ConfirmPrompt) -> Self {
        Self { messages, prompt }
    }

    /// Validate one route.
    ///
    /// `index` is the route's position in multi-route mode and only feeds
    /// error messages.
    pub fn validate(&self, route: Option<&RouteConfig>, index: Option<usize>) -> PublishResult<Route> {
        let config = route.ok_or_else(|| {
            PublishError::configuration(self.messages.get(MessageId::EmptyCdnConfig))
        })?;

        let raw_kind = config.kind.as_deref().unwrap_or_default();
        let kind: BackendKind = raw_kind.parse().map_err(|_| {
            PublishError::configuration(format!(
                "{}: {}{}",
                self.messages.get(MessageId::CdnTypeNotSupported),
                raw_kind,
                index_suffix(index)
            ))
        })?;

        if kind.requires_key_pair() && !config.has_key_pair() {
            return Err(PublishError::configuration(format!(
                "{}{}",
                self.messages
                    .format(MessageId::EmptyAccessOrSecret, &[kind.display_name()]),
                index_suffix(index)
            )));
        }

        if kind.is_directory_oriented() && config.dest_path.is_none() {
            return Err(PublishError::configuration(format!(
                "{}{}",
                self.messages.get(MessageId::InvalidFtpDestPath),
                index_suffix(index)
            )));
        }

        let pattern = match config.test.as_deref() {
            Some(raw) => Some(MatchPattern::parse(raw).map_err(|e| {
                PublishError::configuration(format!(
                    "{}: {}{}",
                    self.messages.get(MessageId::InvalidRegex),
                    e,
                    index_suffix(index)
                ))
            })?),
            None => None,
        };

        Ok(Route::new(kind, pattern, config.clone()))
    }

    /// Validate the `cdn` option as a whole.
    ///
    /// Multi-route mode requires a non-empty list and a pattern on every
    /// route. A repeated pattern asks for confirmation; declining rejects
    /// every route.
    pub async fn validate_all(&self, cdn: Option<&CdnConfig>) -> PublishResult<Vec<Route>> {
        let routes = match cdn {
            None => return Err(PublishError::configuration(self.messages.get(MessageId::EmptyCdnConfig))),
            Some(CdnConfig::Single(route)) => return Ok(vec![self.validate(Some(route), None)?]),
            Some(CdnConfig::Multiple(routes)) => routes,
        };

        if routes.is_empty() {
            return Err(PublishError::configuration(
                self.messages.get(MessageId::EmptyCdnConfig),
            ));
        }

        let mut validated = Vec::with_capacity(routes.len());
        let mut first_error = None;
        let mut seen = HashSet::new();
        let mut terminated = false;

        for (index, config) in routes.iter().enumerate() {
            let route = match self.validate(Some(config), Some(index)) {
                Ok(route) => route,
                Err(e) => {
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            let Some(pattern) = route.pattern() else {
                first_error.get_or_insert(PublishError::configuration(format!(
                    "{}, Index: {}",
                    self.messages.get(MessageId::InvalidRegex),
                    index
                )));
                continue;
            };

            if !seen.insert(pattern.normalized()) {
                debug!(pattern = %pattern.normalized(), index, "Duplicate match pattern");
                let question = self.messages.get(MessageId::DuplicateRegexFoundQuestion);
                if !self.prompt.confirm(question).await {
                    terminated = true;
                }
            }

            validated.push(route);
        }

        if terminated {
            let message = self.messages.get(MessageId::DuplicateRegexFound);
            warn!("{}", message);
            return Err(PublishError::DuplicatePattern(message.to_string()));
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::confirm::FixedAnswer;

    struct CountingPrompt {
        answer: bool,
        asked: AtomicUsize,
    }

    #[async_trait]
    impl ConfirmPrompt for CountingPrompt {
        async fn confirm(&self, _question: &str) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn s3(test: Option<&str>) -> RouteConfig {
        let mut route = RouteConfig::new(BackendKind::S3);
        route.access_key = Some("ak".into());
        route.secret_key = Some("sk".into());
        route.bucket = Some("bundles".into());
        route.test = test.map(str::to_string);
        route
    }

    fn ftp(test: Option<&str>) -> RouteConfig {
        let mut route = RouteConfig::new(BackendKind::Ftp);
        route.host = Some("ftp.example.com".into());
        route.dest_path = Some("/www".into());
        route.test = test.map(str::to_string);
        route
    }

    #[test]
    fn test_validate_unsupported_type() {
        let messages = Messages::en();
        let validator = RouteValidator::new(&messages, &FixedAnswer(true));

        let mut route = s3(None);
        route.kind = Some("aliyun".into());
        let err = validator.validate(Some(&route), Some(2)).unwrap_err();
        assert_eq!(err.to_string(), "Not supported CDN type: aliyun CDN index:2");

        route.kind = None;
        assert!(validator.validate(Some(&route), None).is_err());
        assert!(validator.validate(None, None).unwrap_err().is_configuration());
    }

    #[test]
    fn test_validate_missing_credentials() {
        let messages = Messages::en();
        let validator = RouteValidator::new(&messages, &FixedAnswer(true));

        let mut route = s3(None);
        route.secret_key = None;
        let err = validator.validate(Some(&route), None).unwrap_err();
        assert_eq!(err.to_string(), "Empty S3 access key or secret key");

        let mut route = ftp(None);
        route.dest_path = None;
        let err = validator.validate(Some(&route), None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid ftp destination path");
    }

    #[test]
    fn test_validate_compiles_pattern() {
        let messages = Messages::en();
        let validator = RouteValidator::new(&messages, &FixedAnswer(true));

        let route = validator.validate(Some(&s3(Some(r"/\.js$/i"))), None).unwrap();
        assert!(route.pattern().unwrap().is_match("dist/APP.JS"));

        let err = validator.validate(Some(&s3(Some("/(unclosed/"))), None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_validate_all_single_route() {
        let messages = Messages::en();
        let validator = RouteValidator::new(&messages, &FixedAnswer(true));

        let routes = validator
            .validate_all(Some(&CdnConfig::Single(s3(None))))
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert!(routes[0].pattern().is_none());
    }

    #[tokio::test]
    async fn test_validate_all_rejects_empty_and_missing() {
        let messages = Messages::en();
        let validator = RouteValidator::new(&messages, &FixedAnswer(true));

        let err = validator.validate_all(Some(&CdnConfig::Multiple(vec![]))).await.unwrap_err();
        assert_eq!(err.to_string(), "Empty CDN upload config");
        assert!(validator.validate_all(None).await.is_err());
    }

    #[tokio::test]
    async fn test_validate_all_requires_patterns() {
        let messages = Messages::en();
        let validator = RouteValidator::new(&messages, &FixedAnswer(true));

        let cdn = CdnConfig::Multiple(vec![s3(Some(r"/\.js$/")), ftp(None)]);
        let err = validator.validate_all(Some(&cdn)).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid regex pattern, Index: 1");
    }

    #[tokio::test]
    async fn test_duplicate_pattern_accepted() {
        let messages = Messages::en();
        let prompt = CountingPrompt {
            answer: true,
            asked: AtomicUsize::new(0),
        };
        let validator = RouteValidator::new(&messages, &prompt);

        let cdn = CdnConfig::Multiple(vec![s3(Some(r"/\.js$/")), ftp(Some(r"\.js$"))]);
        let routes = validator.validate_all(Some(&cdn)).await.unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_pattern_declined_rejects_all() {
        let messages = Messages::en();
        let prompt = CountingPrompt {
            answer: false,
            asked: AtomicUsize::new(0),
        };
        let validator = RouteValidator::new(&messages, &prompt);

        let cdn = CdnConfig::Multiple(vec![
            s3(Some(r"/\.js$/")),
            ftp(Some(r"/\.css$/")),
            ftp(Some(r"/\.js$/")),
            s3(Some(r"/\.css$/")),
        ]);
        let err = validator.validate_all(Some(&cdn)).await.unwrap_err();
        assert!(matches!(err, PublishError::DuplicatePattern(_)));
        assert_eq!(
            err.to_string(),
            "Upload task terminated due to duplicate Regex pattern found"
        );
        // Every duplicate is still asked about.
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 2);
    }
}
