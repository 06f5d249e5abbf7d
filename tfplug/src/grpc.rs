//! gRPC service implementation of the Terraform Plugin Protocol v6
//!
//! `GrpcProviderServer` adapts a [`Provider`] to the generated tonic service.
//! Resources and data sources are created from their factories on demand and
//! configured with the provider data stored by `ConfigureProvider`. All
//! values crossing the wire are normalised against the schema first: cty
//! needs every attribute present, so missing ones are sent as null and
//! absent repeated blocks as empty lists.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSource, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::proto::{self, ProviderService};
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderSchemaRequest,
    ResourceFactory, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, Resource, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::Schema;
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, Dynamic, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;
type RpcResult<T> = std::result::Result<Response<T>, Status>;

struct Schemas {
    provider: Schema,
    resources: HashMap<String, Schema>,
    data_sources: HashMap<String, Schema>,
    diagnostics: Vec<Diagnostic>,
}

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    provider_data: RwLock<ProviderData>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    schemas: OnceCell<Schemas>,
    /// Root context for every operation, cancelled by StopProvider
    stop: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        Self {
            provider: Arc::new(RwLock::new(provider)),
            provider_data: RwLock::new(None),
            resources,
            data_sources,
            schemas: OnceCell::new(),
            stop: Context::new(),
        }
    }

    fn ctx(&self) -> Context {
        self.stop.clone()
    }

    async fn schemas(&self) -> &Schemas {
        self.schemas
            .get_or_init(|| async {
                let mut diagnostics = Vec::new();

                let provider_schema = {
                    let provider = self.provider.read().await;
                    let response = provider.schema(self.ctx(), ProviderSchemaRequest).await;
                    diagnostics.extend(response.diagnostics);
                    response.schema
                };

                let mut resources = HashMap::new();
                for (name, factory) in &self.resources {
                    let response = factory().schema(self.ctx(), ResourceSchemaRequest).await;
                    diagnostics.extend(response.diagnostics);
                    resources.insert(name.clone(), response.schema);
                }

                let mut data_sources = HashMap::new();
                for (name, factory) in &self.data_sources {
                    let response = factory().schema(self.ctx(), DataSourceSchemaRequest).await;
                    diagnostics.extend(response.diagnostics);
                    data_sources.insert(name.clone(), response.schema);
                }

                Schemas {
                    provider: provider_schema,
                    resources,
                    data_sources,
                    diagnostics,
                }
            })
            .await
    }

    async fn resource_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.schemas()
            .await
            .resources
            .get(type_name)
            .ok_or_else(|| unknown_type("resource", type_name))
    }

    async fn data_source_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.schemas()
            .await
            .data_sources
            .get(type_name)
            .ok_or_else(|| unknown_type("data source", type_name))
    }

    async fn configured_resource(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| unknown_type("resource", type_name))?;
        let mut resource = factory();

        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(self.ctx(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn configured_data_source(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| unknown_type("data source", type_name))?;
        let mut data_source = factory();

        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(self.ctx(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(data_source)
    }

    async fn do_validate_resource_config(
        &self,
        req: proto::validate_resource_config::Request,
    ) -> Result<Vec<Diagnostic>, Vec<Diagnostic>> {
        let schema = self.resource_schema(&req.type_name).await?;
        let config = decode(&req.config, "configuration")?;

        let mut diagnostics = Vec::new();
        schema
            .block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resource = self.configured_resource(&req.type_name).await?;
        let response = resource
            .validate(
                self.ctx(),
                ValidateResourceConfigRequest {
                    type_name: req.type_name,
                    config,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);
        Ok(diagnostics)
    }

    async fn do_validate_data_resource_config(
        &self,
        req: proto::validate_data_resource_config::Request,
    ) -> Result<Vec<Diagnostic>, Vec<Diagnostic>> {
        let schema = self.data_source_schema(&req.type_name).await?;
        let config = decode(&req.config, "configuration")?;

        let mut diagnostics = Vec::new();
        schema
            .block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let data_source = self.configured_data_source(&req.type_name).await?;
        let response = data_source
            .validate(
                self.ctx(),
                ValidateDataSourceConfigRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);
        Ok(diagnostics)
    }

    async fn do_upgrade_resource_state(
        &self,
        req: proto::upgrade_resource_state::Request,
    ) -> Result<proto::DynamicValue, Vec<Diagnostic>> {
        let schema = self.resource_schema(&req.type_name).await?;
        let raw = req.raw_state.unwrap_or_default();

        if raw.json.is_empty() && !raw.flatmap.is_empty() {
            return Err(vec![Diagnostic::error(
                "Unsupported state format",
                "Flatmap state from Terraform 0.11 and earlier cannot be upgraded.",
            )]);
        }
        if req.version > schema.version {
            return Err(vec![Diagnostic::error(
                "Unsupported state version",
                format!(
                    "State version {} is newer than schema version {} of {}.",
                    req.version, schema.version, req.type_name
                ),
            )]);
        }

        let state = DynamicValue::decode_json(&raw.json)
            .map_err(|e| vec![decode_failed("stored state", e)])?;
        encode(&finalize(schema, &state))
    }

    async fn do_configure_provider(
        &self,
        req: proto::configure_provider::Request,
    ) -> Result<Vec<Diagnostic>, Vec<Diagnostic>> {
        let schemas = self.schemas().await;
        let config = decode(&req.config, "provider configuration")?;

        let mut diagnostics = Vec::new();
        schemas
            .provider
            .block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let config = DynamicValue::new(schemas.provider.normalize(&config.value));
        let response = self
            .provider
            .write()
            .await
            .configure(
                self.ctx(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        diagnostics.extend(response.diagnostics);
        if !has_errors(&diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }
        Ok(diagnostics)
    }

    async fn do_read_resource(
        &self,
        req: proto::read_resource::Request,
    ) -> Result<(proto::DynamicValue, Vec<Diagnostic>), Vec<Diagnostic>> {
        let schema = self.resource_schema(&req.type_name).await?;
        let current = decode(&req.current_state, "current state")?;
        if current.is_null() {
            return Ok((encode(&current)?, Vec::new()));
        }

        let current = DynamicValue::new(schema.normalize(&current.value));
        let resource = self.configured_resource(&req.type_name).await?;
        let response = resource
            .read(
                self.ctx(),
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state: current.clone(),
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        let new_state = if has_errors(&response.diagnostics) {
            current
        } else {
            match response.new_state {
                Some(state) => finalize(schema, &state),
                None => {
                    info!(type_name = %req.type_name, "remote object is gone, removing from state");
                    DynamicValue::null()
                }
            }
        };
        Ok((encode(&new_state)?, response.diagnostics))
    }

    async fn do_plan_resource_change(
        &self,
        req: proto::plan_resource_change::Request,
    ) -> Result<proto::plan_resource_change::Response, Vec<Diagnostic>> {
        let schema = self.resource_schema(&req.type_name).await?;
        let prior = decode(&req.prior_state, "prior state")?;
        let proposed = decode(&req.proposed_new_state, "proposed new state")?;
        let config = decode(&req.config, "configuration")?;

        // Destroy plans pass through unchanged
        if proposed.is_null() {
            return Ok(proto::plan_resource_change::Response {
                planned_state: Some(encode(&proposed)?),
                legacy_type_system: true,
                ..Default::default()
            });
        }

        let mut requires_replace = Vec::new();
        let mut diagnostics = Vec::new();
        let planned = schema.block.plan(
            &prior.value,
            &proposed.value,
            &config.value,
            &AttributePath::root(),
            &mut requires_replace,
            &mut diagnostics,
        );
        if !requires_replace.is_empty() {
            debug!(type_name = %req.type_name, paths = ?requires_replace, "plan requires replacement");
        }

        Ok(proto::plan_resource_change::Response {
            planned_state: Some(encode(&DynamicValue::new(planned))?),
            requires_replace: requires_replace.iter().map(path_to_proto).collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(&diagnostics),
            legacy_type_system: true,
        })
    }

    async fn do_apply_resource_change(
        &self,
        req: proto::apply_resource_change::Request,
    ) -> Result<(proto::DynamicValue, Vec<Diagnostic>), Vec<Diagnostic>> {
        let schema = self.resource_schema(&req.type_name).await?;
        let prior = decode(&req.prior_state, "prior state")?;
        let planned = decode(&req.planned_state, "planned state")?;
        let config = decode(&req.config, "configuration")?;
        let resource = self.configured_resource(&req.type_name).await?;
        let ctx = self.ctx();

        let (new_state, diagnostics) = if planned.is_null() {
            debug!(type_name = %req.type_name, "deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior.clone(),
                    },
                )
                .await;
            let state = if has_errors(&response.diagnostics) {
                prior
            } else {
                DynamicValue::null()
            };
            (state, response.diagnostics)
        } else if prior.is_null() {
            debug!(type_name = %req.type_name, "creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state: planned,
                        config,
                    },
                )
                .await;
            // A failed create only leaves state behind when the object got an id
            let state = if has_errors(&response.diagnostics) && !has_id(&response.new_state) {
                DynamicValue::null()
            } else {
                response.new_state
            };
            (state, response.diagnostics)
        } else {
            debug!(type_name = %req.type_name, "updating resource");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior.clone(),
                        planned_state: planned,
                        config,
                    },
                )
                .await;
            let state = if has_errors(&response.diagnostics) {
                prior
            } else {
                response.new_state
            };
            (state, response.diagnostics)
        };

        if has_errors(&diagnostics) {
            warn!(type_name = %req.type_name, "apply finished with errors");
        }
        Ok((encode(&finalize(schema, &new_state))?, diagnostics))
    }

    async fn do_import_resource_state(
        &self,
        req: proto::import_resource_state::Request,
    ) -> Result<proto::import_resource_state::Response, Vec<Diagnostic>> {
        let schema = self.resource_schema(&req.type_name).await?;
        let resource = self.configured_resource(&req.type_name).await?;
        let response = resource
            .import_state(
                self.ctx(),
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode(&finalize(schema, &imported.state))?),
                private: Vec::new(),
            });
        }

        Ok(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(&response.diagnostics),
        })
    }

    async fn do_read_data_source(
        &self,
        req: proto::read_data_source::Request,
    ) -> Result<(proto::DynamicValue, Vec<Diagnostic>), Vec<Diagnostic>> {
        let schema = self.data_source_schema(&req.type_name).await?;
        let config = decode(&req.config, "configuration")?;
        let config = DynamicValue::new(schema.normalize(&config.value));

        let data_source = self.configured_data_source(&req.type_name).await?;
        let response = data_source
            .read(
                self.ctx(),
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                    client_capabilities: client_capabilities(req.client_capabilities),
                },
            )
            .await;

        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok((encode(&finalize(schema, &response.state))?, response.diagnostics))
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> RpcResult<proto::get_metadata::Response> {
        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: Vec::new(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> RpcResult<proto::get_provider_schema::Response> {
        let schemas = self.schemas().await;

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schemas.provider.to_proto()),
            resource_schemas: schemas
                .resources
                .iter()
                .map(|(name, schema)| (name.clone(), schema.to_proto()))
                .collect(),
            data_source_schemas: schemas
                .data_sources
                .iter()
                .map(|(name, schema)| (name.clone(), schema.to_proto()))
                .collect(),
            diagnostics: diagnostics_to_proto(&schemas.diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> RpcResult<proto::validate_provider_config::Response> {
        let req = request.into_inner();
        let schemas = self.schemas().await;

        let diagnostics = match decode(&req.config, "provider configuration") {
            Ok(config) => {
                let mut diagnostics = Vec::new();
                schemas
                    .provider
                    .block
                    .validate(&config.value, &AttributePath::root(), &mut diagnostics);
                let response = self
                    .provider
                    .read()
                    .await
                    .validate(self.ctx(), ValidateProviderConfigRequest { config })
                    .await;
                diagnostics.extend(response.diagnostics);
                diagnostics
            }
            Err(diagnostics) => diagnostics,
        };

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> RpcResult<proto::validate_resource_config::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ValidateResourceConfig");
        let diagnostics = self
            .do_validate_resource_config(req)
            .await
            .unwrap_or_else(|diags| diags);

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> RpcResult<proto::validate_data_resource_config::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ValidateDataResourceConfig");
        let diagnostics = self
            .do_validate_data_resource_config(req)
            .await
            .unwrap_or_else(|diags| diags);

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> RpcResult<proto::upgrade_resource_state::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, version = req.version, "UpgradeResourceState");

        let response = match self.do_upgrade_resource_state(req).await {
            Ok(state) => proto::upgrade_resource_state::Response {
                upgraded_state: Some(state),
                diagnostics: Vec::new(),
            },
            Err(diags) => proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(&diags),
            },
        };
        Ok(Response::new(response))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> RpcResult<proto::configure_provider::Response> {
        let req = request.into_inner();
        info!(terraform_version = %req.terraform_version, "configuring provider");

        let diagnostics = self
            .do_configure_provider(req)
            .await
            .unwrap_or_else(|diags| diags);

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> RpcResult<proto::read_resource::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ReadResource");
        let fallback = req.current_state.clone();

        let response = match self.do_read_resource(req).await {
            Ok((new_state, diagnostics)) => proto::read_resource::Response {
                new_state: Some(new_state),
                diagnostics: diagnostics_to_proto(&diagnostics),
                private: Vec::new(),
            },
            Err(diags) => proto::read_resource::Response {
                new_state: fallback,
                diagnostics: diagnostics_to_proto(&diags),
                private: Vec::new(),
            },
        };
        Ok(Response::new(response))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> RpcResult<proto::plan_resource_change::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "PlanResourceChange");

        let response = match self.do_plan_resource_change(req).await {
            Ok(response) => response,
            Err(diags) => proto::plan_resource_change::Response {
                diagnostics: diagnostics_to_proto(&diags),
                legacy_type_system: true,
                ..Default::default()
            },
        };
        Ok(Response::new(response))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> RpcResult<proto::apply_resource_change::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ApplyResourceChange");
        let fallback = req.prior_state.clone();

        let response = match self.do_apply_resource_change(req).await {
            Ok((new_state, diagnostics)) => proto::apply_resource_change::Response {
                new_state: Some(new_state),
                private: Vec::new(),
                diagnostics: diagnostics_to_proto(&diagnostics),
                legacy_type_system: true,
            },
            Err(diags) => proto::apply_resource_change::Response {
                new_state: fallback,
                private: Vec::new(),
                diagnostics: diagnostics_to_proto(&diags),
                legacy_type_system: true,
            },
        };
        Ok(Response::new(response))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> RpcResult<proto::import_resource_state::Response> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, id = %req.id, "importing resource");

        let response = match self.do_import_resource_state(req).await {
            Ok(response) => response,
            Err(diags) => proto::import_resource_state::Response {
                imported_resources: Vec::new(),
                diagnostics: diagnostics_to_proto(&diags),
            },
        };
        Ok(Response::new(response))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> RpcResult<proto::read_data_source::Response> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ReadDataSource");

        let response = match self.do_read_data_source(req).await {
            Ok((state, diagnostics)) => proto::read_data_source::Response {
                state: Some(state),
                diagnostics: diagnostics_to_proto(&diagnostics),
            },
            Err(diags) => proto::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(&diags),
            },
        };
        Ok(Response::new(response))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> RpcResult<proto::stop_provider::Response> {
        info!("stop requested, cancelling in-flight operations");
        self.stop.cancel();

        let response = self.provider.read().await.stop(self.ctx()).await;
        Ok(Response::new(proto::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn unknown_type(kind: &str, type_name: &str) -> Vec<Diagnostic> {
    vec![Diagnostic::error(
        format!("Unknown {} type", kind),
        format!("The provider does not support {} type \"{}\".", kind, type_name),
    )]
}

fn decode_failed(what: &str, err: TfplugError) -> Diagnostic {
    Diagnostic::error(format!("Failed to decode {}", what), err.to_string())
}

fn decode(
    value: &Option<proto::DynamicValue>,
    what: &str,
) -> Result<DynamicValue, Vec<Diagnostic>> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else {
        DynamicValue::decode_json(&value.json)
    };
    decoded.map_err(|e| vec![decode_failed(what, e)])
}

fn encode(value: &DynamicValue) -> Result<proto::DynamicValue, Vec<Diagnostic>> {
    let msgpack = value.encode_msgpack().map_err(|e| {
        vec![Diagnostic::error("Failed to encode state", e.to_string())]
    })?;
    Ok(proto::DynamicValue {
        msgpack,
        json: Vec::new(),
    })
}

/// Normalise a state for Terraform; nothing may stay unknown after apply
fn finalize(schema: &Schema, state: &DynamicValue) -> DynamicValue {
    DynamicValue::new(known_or_null(schema.normalize(&state.value)))
}

fn known_or_null(value: Dynamic) -> Dynamic {
    match value {
        Dynamic::Unknown => Dynamic::Null,
        Dynamic::List(items) => Dynamic::List(items.into_iter().map(known_or_null).collect()),
        Dynamic::Map(map) => Dynamic::Map(
            map.into_iter()
                .map(|(k, v)| (k, known_or_null(v)))
                .collect(),
        ),
        other => other,
    }
}

fn has_id(state: &DynamicValue) -> bool {
    state
        .attribute("id")
        .as_str()
        .is_some_and(|id| !id.is_empty())
}

fn client_capabilities(capabilities: Option<proto::ClientCapabilities>) -> ClientCapabilities {
    capabilities
        .map(|c| ClientCapabilities {
            deferral_allowed: c.deferral_allowed,
            write_only_attributes_allowed: c.write_only_attributes_allowed,
        })
        .unwrap_or_default()
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diagnostics: &[Diagnostic]) -> Vec<proto::Diagnostic> {
    diagnostics
        .iter()
        .map(|diag| proto::Diagnostic {
            severity: match diag.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: diag.summary.clone(),
            detail: diag.detail.clone(),
            attribute: diag.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{
        ConfigureDataSourceResponse, DataSourceSchemaResponse, ReadDataSourceResponse,
    };
    use crate::provider::{ConfigureProviderResponse, ProviderSchemaResponse};
    use crate::resource::{
        ConfigureResourceResponse, CreateResourceResponse, DeleteResourceResponse,
        ReadResourceResponse, ResourceSchemaResponse, UpdateResourceResponse,
    };
    use crate::schema::{AttributeBuilder, SchemaBuilder};
    use crate::plan_modifier::UseStateForUnknown;
    use async_trait::async_trait;

    struct TestProvider;

    #[async_trait]
    impl Provider for TestProvider {
        fn type_name(&self) -> &str {
            "test"
        }

        async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
            ProviderSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(AttributeBuilder::string("endpoint").required().build())
                    .build(),
                diagnostics: Vec::new(),
            }
        }

        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureProviderRequest,
        ) -> ConfigureProviderResponse {
            let endpoint = request.config.attribute("endpoint").as_str().unwrap_or_default().to_string();
            ConfigureProviderResponse {
                diagnostics: Vec::new(),
                provider_data: Some(Arc::new(endpoint)),
            }
        }

        fn resources(&self) -> HashMap<String, ResourceFactory> {
            let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
            resources.insert(
                "test_thing".to_string(),
                Box::new(|| Box::new(ThingResource { endpoint: None })),
            );
            resources
        }

        fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
            let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
            data_sources.insert(
                "test_endpoint".to_string(),
                Box::new(|| Box::new(EndpointDataSource { endpoint: None })),
            );
            data_sources
        }
    }

    struct ThingResource {
        endpoint: Option<String>,
    }

    #[async_trait]
    impl Resource for ThingResource {
        fn type_name(&self) -> &str {
            "test_thing"
        }

        async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
            ResourceSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::string("id")
                            .computed()
                            .plan_modifier(UseStateForUnknown::create())
                            .build(),
                    )
                    .attribute(AttributeBuilder::string("name").required().build())
                    .attribute(AttributeBuilder::string("endpoint").computed().build())
                    .build(),
                diagnostics: Vec::new(),
            }
        }

        async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
            let mut state = request.planned_state;
            state.set_attribute("id", "thing-1");
            state.set_attribute("endpoint", self.endpoint.clone());
            CreateResourceResponse {
                new_state: state,
                diagnostics: Vec::new(),
            }
        }

        async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
            let gone = request.current_state.attribute("id").as_str() == Some("gone");
            ReadResourceResponse {
                new_state: (!gone).then_some(request.current_state),
                diagnostics: Vec::new(),
            }
        }

        async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
            UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error("update failed", "")],
            }
        }

        async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
            DeleteResourceResponse {
                diagnostics: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ResourceWithConfigure for ThingResource {
        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureResourceRequest,
        ) -> ConfigureResourceResponse {
            self.endpoint = request
                .provider_data
                .and_then(|data| data.downcast_ref::<String>().cloned());
            ConfigureResourceResponse {
                diagnostics: Vec::new(),
            }
        }
    }

    struct EndpointDataSource {
        endpoint: Option<String>,
    }

    #[async_trait]
    impl DataSource for EndpointDataSource {
        fn type_name(&self) -> &str {
            "test_endpoint"
        }

        async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(AttributeBuilder::string("id").computed().build())
                    .attribute(AttributeBuilder::string("endpoint").computed().build())
                    .attribute(AttributeBuilder::string("filter").optional().build())
                    .build(),
                diagnostics: Vec::new(),
            }
        }

        async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
            let mut state = DynamicValue::empty_object();
            state.set_attribute("id", "endpoint");
            state.set_attribute("endpoint", self.endpoint.clone());
            ReadDataSourceResponse {
                state,
                diagnostics: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl DataSourceWithConfigure for EndpointDataSource {
        async fn configure(
            &mut self,
            _ctx: Context,
            request: ConfigureDataSourceRequest,
        ) -> ConfigureDataSourceResponse {
            self.endpoint = request
                .provider_data
                .and_then(|data| data.downcast_ref::<String>().cloned());
            ConfigureDataSourceResponse {
                diagnostics: Vec::new(),
            }
        }
    }

    fn dv(pairs: &[(&str, Dynamic)]) -> Option<proto::DynamicValue> {
        let mut value = DynamicValue::empty_object();
        for (k, v) in pairs {
            value.set_attribute(k, v.clone());
        }
        Some(proto::DynamicValue {
            msgpack: value.encode_msgpack().unwrap(),
            json: Vec::new(),
        })
    }

    fn null_dv() -> Option<proto::DynamicValue> {
        Some(proto::DynamicValue {
            msgpack: DynamicValue::null().encode_msgpack().unwrap(),
            json: Vec::new(),
        })
    }

    fn read_back(value: Option<proto::DynamicValue>) -> DynamicValue {
        DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
    }

    async fn configured_server() -> GrpcProviderServer<TestProvider> {
        let server = GrpcProviderServer::new(TestProvider);
        let response = server
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.9.0".to_string(),
                config: dv(&[("endpoint", Dynamic::from("https://api.test"))]),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty());
        server
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schema_lists_resources_and_data_sources() {
        let server = GrpcProviderServer::new(TestProvider);
        let schema = server
            .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        assert!(schema.resource_schemas.contains_key("test_thing"));
        assert!(schema.data_source_schemas.contains_key("test_endpoint"));
        assert_eq!(schema.provider.unwrap().block.unwrap().attributes.len(), 1);

        let metadata = server
            .get_metadata(Request::new(proto::get_metadata::Request {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(metadata.resources[0].type_name, "test_thing");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn configure_rejects_missing_required_argument() {
        let server = GrpcProviderServer::new(TestProvider);
        let response = server
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.9.0".to_string(),
                config: dv(&[]),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Missing required argument");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn plan_create_marks_computed_unknown() {
        let server = configured_server().await;
        let config = dv(&[("name", Dynamic::from("a"))]);
        let response = server
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: null_dv(),
                proposed_new_state: config.clone(),
                config,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.legacy_type_system);
        let planned = read_back(response.planned_state);
        assert!(planned.attribute("id").is_unknown());
        assert!(planned.attribute("endpoint").is_unknown());
        assert_eq!(planned.attribute("name").as_str(), Some("a"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_create_uses_provider_data() {
        let server = configured_server().await;
        let planned = dv(&[
            ("id", Dynamic::Unknown),
            ("name", Dynamic::from("a")),
            ("endpoint", Dynamic::Unknown),
        ]);
        let response = server
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: null_dv(),
                planned_state: planned,
                config: dv(&[("name", Dynamic::from("a"))]),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
        assert!(response.legacy_type_system);
        let state = read_back(response.new_state);
        assert_eq!(state.attribute("id").as_str(), Some("thing-1"));
        assert_eq!(state.attribute("endpoint").as_str(), Some("https://api.test"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_delete_returns_null_state() {
        let server = configured_server().await;
        let prior = dv(&[("id", Dynamic::from("thing-1")), ("name", Dynamic::from("a"))]);
        let response = server
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: prior,
                planned_state: null_dv(),
                config: null_dv(),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(read_back(response.new_state).is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_update_keeps_prior_state() {
        let server = configured_server().await;
        let prior = dv(&[("id", Dynamic::from("thing-1")), ("name", Dynamic::from("a"))]);
        let planned = dv(&[("id", Dynamic::from("thing-1")), ("name", Dynamic::from("b"))]);
        let response = server
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: prior,
                planned_state: planned,
                config: dv(&[("name", Dynamic::from("b"))]),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(read_back(response.new_state).attribute("name").as_str(), Some("a"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_of_missing_object_returns_null() {
        let server = configured_server().await;
        let response = server
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_thing".to_string(),
                current_state: dv(&[("id", Dynamic::from("gone")), ("name", Dynamic::from("a"))]),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
        assert!(read_back(response.new_state).is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_passes_id_through() {
        let server = configured_server().await;
        let response = server
            .import_resource_state(Request::new(proto::import_resource_state::Request {
                type_name: "test_thing".to_string(),
                id: "thing-9".to_string(),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.imported_resources.len(), 1);
        let state = read_back(response.imported_resources[0].state.clone());
        assert_eq!(state.attribute("id").as_str(), Some("thing-9"));
        assert!(state.attribute("name").is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upgrade_normalises_json_state() {
        let server = configured_server().await;
        let response = server
            .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
                type_name: "test_thing".to_string(),
                version: 0,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"thing-1","name":"a","removed":"x"}"#.to_vec(),
                    flatmap: HashMap::new(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();

        let state = read_back(response.upgraded_state);
        assert_eq!(state.value.as_map().unwrap().len(), 3);
        assert!(state.attribute("endpoint").is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_data_source_fills_state() {
        let server = configured_server().await;
        let response = server
            .read_data_source(Request::new(proto::read_data_source::Request {
                type_name: "test_endpoint".to_string(),
                config: dv(&[]),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        let state = read_back(response.state);
        assert_eq!(state.attribute("endpoint").as_str(), Some("https://api.test"));
        assert!(state.attribute("filter").is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_resource_type_is_a_diagnostic() {
        let server = configured_server().await;
        let response = server
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_missing".to_string(),
                config: dv(&[]),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("Unknown resource type"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_cancels_root_context() {
        let server = configured_server().await;
        let ctx = server.ctx();
        server
            .stop_provider(Request::new(proto::stop_provider::Request {}))
            .await
            .unwrap();

        assert!(ctx.is_cancelled());
    }
}
