use serde::Deserialize;

/// Minimal client for the Steam Web API endpoints the backend needs.
pub struct Client {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    response: T,
}

impl Client {
    pub fn new<IS>(api_key: IS) -> Self
    where
        IS: Into<String>,
    {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    pub async fn get<T>(&self, path: &str, args: &[(&str, &str)]) -> Result<T, String>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(path)
            .query(&[("key", &self.api_key)])
            .query(args)
            .send()
            .await
            .map_err(|e| format!("Sending request: {}", e))?;
        if !response.status().is_success() {
            return Err(format!("Steam API returned {}", response.status()));
        }

        response
            .json::<Response<T>>()
            .await
            .map(|r| r.response)
            .map_err(|e| format!("Parsing response: {}", e))
    }
}
