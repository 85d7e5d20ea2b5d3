//! Request and response bodies of the StarCloud HTTP API.
//!
//! Responses are deserialized leniently and then checked field by field, so a
//! changed shape surfaces as a [`ProtocolError`] naming what was missing.

use serde::{Deserialize, Serialize};

use starcloud::{AuthSession, FileRecord, ProtocolError, SignedLink, UserId};

/// `POST /aiforearth/api/data/getFileListByPage`
#[derive(Debug, Serialize)]
pub struct FileListRequest {
    pub params: FileListParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListParams {
    pub count: usize,
    pub enable_spatial_query: bool,
    pub page: usize,
    pub path: String,
    pub table: String,
}

#[derive(Debug, Deserialize)]
pub struct FileListResponse {
    pub response: Option<Vec<FileListEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct FileListEntry {
    pub file: Option<String>,
    pub size: Option<WireSize>,
}

/// Byte sizes arrive as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireSize {
    Number(u64),
    Text(String),
}

impl WireSize {
    pub fn to_bytes(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl FileListResponse {
    pub fn into_records(self) -> Result<Vec<FileRecord>, ProtocolError> {
        let entries = self
            .response
            .ok_or_else(|| ProtocolError::new("file list has no `response` array"))?;

        entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let filename = entry
                    .file
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| ProtocolError::new(format!("entry {i} has no `file`")))?;
                let size = entry
                    .size
                    .as_ref()
                    .and_then(WireSize::to_bytes)
                    .ok_or_else(|| {
                        ProtocolError::new(format!("entry {filename} has no numeric `size`"))
                    })?;
                Ok(FileRecord::new(filename, size))
            })
            .collect()
    }
}

/// `POST /starcloud/api/file/downloadResource`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest<'a> {
    pub country: &'a str,
    pub object_key: String,
    pub resource_id: u32,
    pub resource_type: &'a str,
    pub user_account: &'a str,
    pub user_id: &'a UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub file_name: Option<String>,
    pub signed_url: Option<String>,
    pub file_size: Option<WireSize>,
}

impl LinkResponse {
    pub fn into_link(self) -> Result<SignedLink, ProtocolError> {
        let filename = self
            .file_name
            .ok_or_else(|| ProtocolError::new("link response has no `fileName`"))?;
        let url = self
            .signed_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ProtocolError::new("link response has no `signedUrl`"))?;
        let size = self
            .file_size
            .as_ref()
            .and_then(WireSize::to_bytes)
            .ok_or_else(|| ProtocolError::new("link response has no numeric `fileSize`"))?;

        Ok(SignedLink {
            filename,
            url,
            size,
        })
    }
}

/// `POST /starcloud/api/user/authenticate`
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub key: String,
}

/// Plaintext that gets encrypted into [`LoginRequest::key`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload<'a> {
    pub account: &'a str,
    pub password: &'a str,
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub id: Option<UserId>,
    pub user_name: Option<String>,
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn into_session(self) -> Result<AuthSession, ProtocolError> {
        let data = self
            .data
            .ok_or_else(|| ProtocolError::new("login response has no `data`"))?;

        Ok(AuthSession {
            user_id: data
                .id
                .ok_or_else(|| ProtocolError::new("login response has no `data.id`"))?,
            user_name: data
                .user_name
                .ok_or_else(|| ProtocolError::new("login response has no `data.userName`"))?,
            token: data
                .token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ProtocolError::new("login response has no `data.token`"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_list_request_uses_camel_case() {
        let request = FileListRequest {
            params: FileListParams {
                count: 100,
                enable_spatial_query: false,
                page: 1,
                path: "CSDC_samples/SDC_V003/31UFS/2020".into(),
                table: "rs_csdc30".into(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["params"]["enableSpatialQuery"], false);
        assert_eq!(json["params"]["count"], 100);
        assert_eq!(json["params"]["table"], "rs_csdc30");
    }

    #[test]
    fn sizes_may_be_numbers_or_strings() {
        let response: FileListResponse = serde_json::from_str(
            r#"{"response":[{"file":"a.tif","size":12},{"file":"b.tif","size":"34"}]}"#,
        )
        .unwrap();
        let records = response.into_records().unwrap();
        assert_eq!(
            records,
            vec![FileRecord::new("a.tif", 12), FileRecord::new("b.tif", 34)]
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let response: FileListResponse = serde_json::from_str(
            r#"{"total":1,"response":[{"file":"a.tif","size":1,"geom":null}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_records().unwrap().len(), 1);
    }

    #[test]
    fn missing_response_array_is_protocol_error() {
        let response: FileListResponse = serde_json::from_str(r#"{"code":500}"#).unwrap();
        let err = response.into_records().unwrap_err();
        assert!(err.to_string().contains("response"));
    }

    #[test]
    fn non_numeric_size_is_protocol_error() {
        let response: FileListResponse =
            serde_json::from_str(r#"{"response":[{"file":"a.tif","size":"big"}]}"#).unwrap();
        let err = response.into_records().unwrap_err();
        assert!(err.to_string().contains("a.tif"));
    }

    #[test]
    fn link_response_maps_to_signed_link() {
        let response: LinkResponse = serde_json::from_str(
            r#"{"fileName":"a.tif","signedUrl":"https://x/a.tif?sig=1","fileSize":"2048"}"#,
        )
        .unwrap();
        let link = response.into_link().unwrap();
        assert_eq!(link.filename, "a.tif");
        assert_eq!(link.size, 2048);
    }

    #[test]
    fn link_without_url_is_protocol_error() {
        let response: LinkResponse =
            serde_json::from_str(r#"{"fileName":"a.tif","fileSize":1}"#).unwrap();
        assert!(response.into_link().is_err());
    }

    #[test]
    fn login_response_requires_token() {
        let ok: LoginResponse = serde_json::from_str(
            r#"{"data":{"id":17,"userName":"someone","token":"jwt"}}"#,
        )
        .unwrap();
        let session = ok.into_session().unwrap();
        assert_eq!(session.user_id, UserId::Numeric(17));
        assert_eq!(session.token, "jwt");

        let missing: LoginResponse =
            serde_json::from_str(r#"{"data":{"id":17,"userName":"someone"}}"#).unwrap();
        assert!(missing.into_session().is_err());

        let null_data: LoginResponse = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(null_data.into_session().is_err());
    }

    #[test]
    fn login_payload_is_compact_camel_case() {
        let payload = LoginPayload {
            account: "a@b.c",
            password: "pw",
            remember_me: false,
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"account":"a@b.c","password":"pw","rememberMe":false}"#
        );
    }
}
