use crate::coordination::Identifiable;
use crate::model::{Item, Parsed, Response};
use crate::CrawlError;
use std::sync::Arc;

/// A caller-supplied function turning a response into requests and items
pub type ParseFn<I> =
    Arc<dyn Fn(&Response) -> (Vec<Parsed<I>>, Vec<anyhow::Error>) + Send + Sync>;

/// A pooled worker that runs parse functions against responses
#[derive(Debug)]
pub struct Analyzer {
    id: u32,
}

impl Analyzer {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Runs every parse function against `response`, in order
    ///
    /// A `None` entry yields an indexed error and is skipped. Every derived
    /// request has its depth recomputed as `response.depth() + 1`, whatever the
    /// parse function set. Items pass through untouched.
    pub fn analyze<I: Item>(
        &self,
        parsers: &[Option<ParseFn<I>>],
        response: &Response,
    ) -> (Vec<Parsed<I>>, Vec<CrawlError>) {
        if parsers.is_empty() {
            return (
                Vec::new(),
                vec![CrawlError::Analyze("no parse functions configured".to_string())],
            );
        }
        if !response.valid() {
            return (
                Vec::new(),
                vec![CrawlError::Analyze(format!(
                    "invalid response from {} (status {})",
                    response.url(),
                    response.status()
                ))],
            );
        }

        let child_depth = response.depth().saturating_add(1);
        let mut values = Vec::new();
        let mut errors = Vec::new();

        for (index, parser) in parsers.iter().enumerate() {
            let Some(parse) = parser else {
                errors.push(CrawlError::Analyze(format!(
                    "parse function at index {} is missing",
                    index
                )));
                continue;
            };

            let (parsed, parse_errors) = parse(response);
            values.extend(parsed.into_iter().map(|value| match value {
                Parsed::Request(request) => Parsed::Request(request.with_depth(child_depth)),
                item => item,
            }));
            errors.extend(parse_errors.into_iter().map(|e| {
                CrawlError::Analyze(format!("{}: {:#}", response.url(), e))
            }));
        }

        tracing::trace!(
            analyzer = self.id,
            values = values.len(),
            errors = errors.len(),
            "analyzed {}",
            response.url()
        );

        (values, errors)
    }
}

impl Identifiable for Analyzer {
    fn id(&self) -> u32 {
        self.id
    }
}
