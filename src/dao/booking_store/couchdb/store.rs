use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::dao::{
    booking_store::{BookingStore, StoreTransaction},
    storage::StorageResult,
    tables::Tables,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchTablesDocument, TABLES_DOC_ID},
};

/// CouchDB-backed store keeping every table in one revisioned document.
///
/// Writers from this process are serialized by `write_gate`; writers from
/// other processes are detected through the `_rev` check on commit.
#[derive(Clone)]
pub struct CouchBookingStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    write_gate: Arc<Mutex<()>>,
}

impl CouchBookingStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            write_gate: Arc::new(Mutex::new(())),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .request(Method::PUT, &url)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn load_tables(&self) -> CouchResult<CouchTablesDocument> {
        let url = format!("{}/{}", self.database_url(), TABLES_DOC_ID);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: TABLES_DOC_ID.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(CouchTablesDocument::new(Tables::default(), None)),
            status if status.is_success() => response
                .json::<CouchTablesDocument>()
                .await
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: TABLES_DOC_ID.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: TABLES_DOC_ID.to_string(),
                status: other,
            }),
        }
    }

    async fn store_tables(&self, document: &CouchTablesDocument) -> CouchResult<()> {
        let url = format!("{}/{}", self.database_url(), TABLES_DOC_ID);
        let response = self
            .request(Method::PUT, &url)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: TABLES_DOC_ID.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                doc_id: TABLES_DOC_ID.to_string(),
            }),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: TABLES_DOC_ID.to_string(),
                status: other,
            }),
        }
    }
}

struct CouchTransaction {
    store: CouchBookingStore,
    _gate: OwnedMutexGuard<()>,
    rev: Option<String>,
    working: Tables,
}

impl StoreTransaction for CouchTransaction {
    fn tables(&self) -> &Tables {
        &self.working
    }

    fn tables_mut(&mut self) -> &mut Tables {
        &mut self.working
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move {
            let CouchTransaction {
                store,
                _gate,
                rev,
                working,
            } = *self;
            let document = CouchTablesDocument::new(working, rev);
            store.store_tables(&document).await?;
            debug!("committed booking tables to CouchDB");
            Ok(())
        })
    }
}

impl BookingStore for CouchBookingStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let store = self.clone();
        Box::pin(async move {
            let gate = store.write_gate.clone().lock_owned().await;
            let document = store.load_tables().await?;
            Ok(Box::new(CouchTransaction {
                store,
                _gate: gate,
                rev: document.rev,
                working: document.tables,
            }) as Box<dyn StoreTransaction>)
        })
    }

    fn snapshot(&self) -> BoxFuture<'static, StorageResult<Tables>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.load_tables().await?;
            Ok(document.tables)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .request(Method::GET, &url)
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
