//! # Zipkin Span Uploader
use crate::exporter::model::span::Span;
use crate::exporter::Error;
use reqwest::header::CONTENT_TYPE;
use url::Url;

#[derive(Debug)]
pub(crate) enum Uploader {
    Http(JsonV2Client),
    #[cfg(test)]
    InMemory(in_memory::InMemoryClient),
}

impl Uploader {
    /// Create a new http uploader
    pub(crate) fn new(client: reqwest::blocking::Client, collector_endpoint: Url) -> Self {
        Uploader::Http(JsonV2Client {
            client,
            collector_endpoint,
        })
    }

    /// Upload one batch of spans to the collector.
    pub(crate) fn upload(&self, spans: Vec<Span>) -> Result<(), Error> {
        match self {
            Uploader::Http(client) => client.upload(spans),
            #[cfg(test)]
            Uploader::InMemory(client) => client.upload(spans),
        }
    }
}

#[derive(Debug)]
pub(crate) struct JsonV2Client {
    client: reqwest::blocking::Client,
    collector_endpoint: Url,
}

impl JsonV2Client {
    fn upload(&self, spans: Vec<Span>) -> Result<(), Error> {
        let body = serde_json::to_vec(&spans)?;
        let response = self
            .client
            .post(self.collector_endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        response.error_for_status()?;
        Ok(())
    }
}
