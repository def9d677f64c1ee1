//! An [`ArrayEngine`] speaking the HTTP protocol of the SciDB shim.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::debug;
use url::Url;

use super::{Afl, ArrayEngine, ArraySchema, QueryResult, parse_schema};
use crate::error::{self, Error};
use crate::util::Result;

const ARRAY_EXISTS_CODE: &str = "SCIDB_LE_ARRAY_ALREADY_EXISTS";
const ARRAY_MISSING_CODE: &str = "SCIDB_LE_ARRAY_DOESNT_EXIST";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimCredentials {
    pub user: String,
    pub password: String,
}

/// A shim session that is opened with the first request.
#[derive(Debug)]
pub struct ShimArrayEngine {
    client: Client,
    base_url: Url,
    credentials: Option<ShimCredentials>,
    session_id: Option<String>,
}

impl ShimArrayEngine {
    pub fn new(base_url: Url, credentials: Option<ShimCredentials>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            credentials,
            session_id: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context(error::EngineUrl)
    }

    async fn session_id(&mut self) -> Result<String> {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }

        let mut request = self.client.get(self.endpoint("new_session")?);
        if let Some(credentials) = &self.credentials {
            request = request.query(&[
                ("user", credentials.user.as_str()),
                ("password", credentials.password.as_str()),
            ]);
        }

        let response = request.send().await.context(error::EngineHttp)?;
        let id = response_text(response, "new_session").await?.trim().to_string();
        debug!("Opened shim session {id}");

        self.session_id = Some(id.clone());
        Ok(id)
    }

    /// Runs `query` in the session, saving its output in `save` format if given.
    async fn run_query(&mut self, query: &Afl, save: Option<&str>) -> Result<()> {
        let id = self.session_id().await?;
        let text = query.to_string();

        let mut parameters = vec![("id", id.as_str()), ("query", text.as_str())];
        if let Some(save) = save {
            parameters.push(("save", save));
        }

        let response = self
            .client
            .get(self.endpoint("execute_query")?)
            .query(&parameters)
            .send()
            .await
            .context(error::EngineHttp)?;

        if response.status().is_success() {
            return Ok(());
        }

        let diagnostic = response.text().await.context(error::EngineHttp)?;
        Err(query_error(query, text, diagnostic))
    }

    /// The saved output of the last query of the session.
    async fn read_lines(&mut self) -> Result<String> {
        let id = self.session_id().await?;

        let response = self
            .client
            .get(self.endpoint("read_lines")?)
            .query(&[("id", id.as_str()), ("n", "0")])
            .send()
            .await
            .context(error::EngineHttp)?;

        response_text(response, "read_lines").await
    }
}

async fn response_text(response: Response, request: &str) -> Result<String> {
    let status = response.status();
    let body = response.text().await.context(error::EngineHttp)?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::QueryExecution {
            query: request.to_string(),
            diagnostic: format!("{status}: {body}"),
        })
    }
}

fn query_error(query: &Afl, text: String, diagnostic: String) -> Error {
    match query {
        Afl::CreateArray { name, .. } if diagnostic.contains(ARRAY_EXISTS_CODE) => {
            Error::ArrayExists { name: name.clone() }
        }
        Afl::Show(name) | Afl::Remove(name) if diagnostic.contains(ARRAY_MISSING_CODE) => {
            Error::UnknownArray { name: name.clone() }
        }
        _ => Error::QueryExecution {
            query: text,
            diagnostic,
        },
    }
}

/// Parses `csv+` output into columns of numbers. Empty and `null` cells become `NaN`.
fn parse_numeric_csv(query: &Afl, text: &str) -> Result<QueryResult> {
    let mut reader = csv::ReaderBuilder::new()
        .quote(b'\'')
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let parse_error = |column: &str, reason: String| Error::QueryResultParse {
        query: query.to_string(),
        column: column.to_string(),
        reason,
    };

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| parse_error("header", e.to_string()))?
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_error("record", e.to_string()))?;

        let mut row = Vec::with_capacity(columns.len());
        for (column, field) in columns.iter().zip(record.iter()) {
            let value = if field.is_empty() || field.eq_ignore_ascii_case("null") {
                f64::NAN
            } else {
                field
                    .parse()
                    .map_err(|_| parse_error(column, format!("`{field}` is not a number")))?
            };
            row.push(value);
        }
        rows.push(row);
    }

    Ok(QueryResult::new(columns, rows))
}

/// The first field of each record of `csv` output, without quotes.
fn first_fields(text: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .quote(b'\'')
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    reader
        .records()
        .filter_map(std::result::Result::ok)
        .filter_map(|record| record.get(0).map(ToString::to_string))
        .collect()
}

#[async_trait]
impl ArrayEngine for ShimArrayEngine {
    async fn execute(&mut self, query: &Afl) -> Result<()> {
        self.run_query(query, None).await
    }

    async fn fetch(&mut self, query: &Afl) -> Result<QueryResult> {
        self.run_query(query, Some("csv+")).await?;
        let text = self.read_lines().await?;
        parse_numeric_csv(query, &text)
    }

    async fn describe(&mut self, name: &str) -> Result<ArraySchema> {
        self.run_query(&Afl::show(name), Some("csv")).await?;
        let text = self.read_lines().await?;

        match first_fields(&text).first() {
            Some(schema) => parse_schema(schema).map_err(|e| match e {
                Error::SchemaParse { reason, .. } => Error::SchemaParse { raw: text, reason },
                other => other,
            }),
            None => parse_schema(&text),
        }
    }

    async fn exists(&mut self, name: &str) -> Result<bool> {
        self.run_query(&Afl::list_arrays(), Some("csv")).await?;
        let text = self.read_lines().await?;
        Ok(first_fields(&text).iter().any(|array| array == name))
    }

    async fn upload(&mut self, bytes: Vec<u8>) -> Result<String> {
        let id = self.session_id().await?;
        let size = bytes.len();

        let response = self
            .client
            .post(self.endpoint("upload")?)
            .query(&[("id", id.as_str())])
            .body(bytes)
            .send()
            .await
            .context(error::EngineHttp)?;

        let path = response_text(response, "upload").await?.trim().to_string();
        debug!("Uploaded {size} bytes to {path}");

        Ok(path)
    }

    async fn release(&mut self) -> Result<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };

        let response = self
            .client
            .get(self.endpoint("release_session")?)
            .query(&[("id", id.as_str())])
            .send()
            .await
            .context(error::EngineHttp)?;
        response_text(response, "release_session").await?;

        debug!("Released shim session {id}");
        Ok(())
    }
}
