//! `TestOpsApi` over the service's REST API.

use std::io::Read;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{MigrationError, Result};
use crate::scenario::model::{
    Attachment, ScenarioNormalized, ScenarioStepCreate, ScenarioStepResponse, ScenarioStepUpdate,
};

use super::api::{EntityKind, EntityRef, TestOpsApi};
use super::dto::{
    AuditEntry, CustomFieldValue, Page, Project, SharedStep, SharedStepCreate, SharedStepPatch,
    TestCase, TestCasePatch,
};

fn collection(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::TestCase => "testcase",
        EntityKind::SharedStep => "sharedstep",
    }
}

fn owner_param(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::TestCase => "testCaseId",
        EntityKind::SharedStep => "sharedStepId",
    }
}

/// Build the JSON body of a step creation, adding the owner field.
fn step_create_body(entity: EntityRef, request: &ScenarioStepCreate) -> Result<Value> {
    if entity.kind == EntityKind::SharedStep && request.shared_step_id.is_some() {
        return Err(MigrationError::Unsupported {
            message: format!("shared step reference inside shared step {}", entity.id),
        });
    }
    let mut body = serde_json::to_value(request)?;
    if let Value::Object(map) = &mut body {
        map.insert(owner_param(entity.kind).to_string(), Value::from(entity.id));
    }
    Ok(body)
}

pub struct HttpTestOps {
    base_url: String,
    client: Client,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTestOps {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .pool_max_idle_per_host(config.thread_count)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url().to_string(),
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/rs/{}", self.base_url, path)
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let builder = match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_ref()),
            None => builder,
        };
        let request = builder.build()?;
        let method = request.method().to_string();
        let url = request.url().to_string();
        log::debug!("HTTP_REQUEST method={} url={}", method, url);

        let response = self.client.execute(request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            log::debug!(
                "HTTP_FAILED method={} url={} status={}",
                method,
                url,
                status.as_u16()
            );
            return Err(MigrationError::Status {
                method,
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        Ok(self.send(builder)?.json()?)
    }

    fn empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).map(|_| ())
    }
}

impl TestOpsApi for HttpTestOps {
    fn find_projects(&self, query: &str, page: i32, size: i32) -> Result<Page<Project>> {
        self.json(self.client.get(self.url("project")).query(&[
            ("query", query.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]))
    }

    fn find_test_cases(
        &self,
        project_id: i64,
        filter: &str,
        deleted: bool,
        page: i32,
        size: i32,
    ) -> Result<Page<TestCase>> {
        self.json(self.client.get(self.url("testcase/__search")).query(&[
            ("projectId", project_id.to_string()),
            ("rql", filter.to_string()),
            ("deleted", deleted.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]))
    }

    fn get_test_case(&self, id: i64) -> Result<TestCase> {
        self.json(self.client.get(self.url(&format!("testcase/{}", id))))
    }

    fn update_test_case(&self, id: i64, patch: &TestCasePatch) -> Result<()> {
        self.empty(
            self.client
                .patch(self.url(&format!("testcase/{}", id)))
                .json(patch),
        )
    }

    fn delete_test_case(&self, id: i64) -> Result<()> {
        self.empty(self.client.delete(self.url(&format!("testcase/{}", id))))
    }

    fn find_shared_steps(
        &self,
        project_id: i64,
        page: i32,
        size: i32,
    ) -> Result<Page<SharedStep>> {
        self.json(self.client.get(self.url("sharedstep")).query(&[
            ("projectId", project_id.to_string()),
            ("archived", "false".to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]))
    }

    fn get_shared_step(&self, id: i64) -> Result<SharedStep> {
        self.json(self.client.get(self.url(&format!("sharedstep/{}", id))))
    }

    fn create_shared_step(&self, request: &SharedStepCreate) -> Result<SharedStep> {
        self.json(self.client.post(self.url("sharedstep")).json(request))
    }

    fn update_shared_step(&self, id: i64, patch: &SharedStepPatch) -> Result<()> {
        self.empty(
            self.client
                .patch(self.url(&format!("sharedstep/{}", id)))
                .json(patch),
        )
    }

    fn get_scenario(&self, entity: EntityRef) -> Result<ScenarioNormalized> {
        self.json(self.client.get(self.url(&format!(
            "{}/{}/step",
            collection(entity.kind),
            entity.id
        ))))
    }

    fn create_step(
        &self,
        entity: EntityRef,
        request: &ScenarioStepCreate,
        after: Option<i64>,
        with_expected_result: bool,
    ) -> Result<ScenarioStepResponse> {
        let body = step_create_body(entity, request)?;
        let mut query = vec![("withExpectedResult", with_expected_result.to_string())];
        if let Some(after) = after {
            query.push(("afterId", after.to_string()));
        }
        self.json(
            self.client
                .post(self.url(&format!("{}/step", collection(entity.kind))))
                .query(&query)
                .json(&body),
        )
    }

    fn update_step(
        &self,
        entity: EntityRef,
        step_id: i64,
        update: &ScenarioStepUpdate,
        with_expected_result: Option<bool>,
    ) -> Result<ScenarioNormalized> {
        let mut builder = self
            .client
            .patch(self.url(&format!("{}/step/{}", collection(entity.kind), step_id)))
            .json(update);
        if let Some(flag) = with_expected_result {
            builder = builder.query(&[("withExpectedResult", flag.to_string())]);
        }
        self.json(builder)
    }

    fn delete_step(&self, entity: EntityRef, step_id: i64) -> Result<()> {
        self.empty(self.client.delete(self.url(&format!(
            "{}/step/{}",
            collection(entity.kind),
            step_id
        ))))
    }

    fn delete_scenario(&self, entity: EntityRef) -> Result<()> {
        self.empty(self.client.delete(self.url(&format!(
            "{}/{}/scenario",
            collection(entity.kind),
            entity.id
        ))))
    }

    fn get_attachments(
        &self,
        entity: EntityRef,
        page: i32,
        size: i32,
    ) -> Result<Page<Attachment>> {
        self.json(
            self.client
                .get(self.url(&format!("{}/attachment", collection(entity.kind))))
                .query(&[
                    (owner_param(entity.kind), entity.id.to_string()),
                    ("page", page.to_string()),
                    ("size", size.to_string()),
                ]),
        )
    }

    fn get_attachment_content(
        &self,
        kind: EntityKind,
        attachment_id: i64,
    ) -> Result<Box<dyn Read + Send>> {
        let response = self.send(self.client.get(self.url(&format!(
            "{}/attachment/{}/content",
            collection(kind),
            attachment_id
        ))))?;
        Ok(Box::new(response))
    }

    fn create_attachment(
        &self,
        entity: EntityRef,
        name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<Vec<Attachment>> {
        let part = multipart::Part::bytes(content)
            .file_name(name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);
        self.json(
            self.client
                .post(self.url(&format!("{}/attachment", collection(entity.kind))))
                .query(&[(owner_param(entity.kind), entity.id.to_string())])
                .multipart(form),
        )
    }

    fn delete_attachment(&self, kind: EntityKind, attachment_id: i64) -> Result<()> {
        self.empty(self.client.delete(self.url(&format!(
            "{}/attachment/{}",
            collection(kind),
            attachment_id
        ))))
    }

    fn get_custom_fields(&self, test_case_id: i64) -> Result<Vec<CustomFieldValue>> {
        self.json(
            self.client
                .get(self.url(&format!("testcase/{}/cfv", test_case_id))),
        )
    }

    fn set_custom_fields(&self, test_case_id: i64, fields: &[CustomFieldValue]) -> Result<()> {
        self.empty(
            self.client
                .post(self.url(&format!("testcase/{}/cfv", test_case_id)))
                .json(fields),
        )
    }

    fn get_audit(&self, test_case_id: i64, page: i32, size: i32) -> Result<Page<AuditEntry>> {
        self.json(self.client.get(self.url("testcase/audit")).query(&[
            ("testCaseId", test_case_id.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]))
    }
}
