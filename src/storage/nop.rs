//! No-op storage backend.
//!
//! Satisfies the contract by failing every operation with
//! [`StorageError::NotImplemented`]. Returned by the factory when the DSN
//! carries no protocol, e.g. offline validation contexts where no real
//! persistence is required. Callers should treat the error as a
//! configuration problem, never as a transient failure.

use super::{ClientStream, Storage};
use crate::error::StorageError;
use crate::models::{
    Alias, AliasKey, Client, ClientMatch, ClientQuery, Group, GroupQuery, IpAddress, IpAddressKey,
    Penalty, PenaltyKind,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Backend with no persistence at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopStorage;

impl NopStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for NopStorage {
    fn protocol(&self) -> &'static str {
        ""
    }

    async fn counts(&self) -> Result<HashMap<String, u64>, StorageError> {
        Err(StorageError::NotImplemented("counts"))
    }

    async fn get_client(&self, _query: &ClientQuery) -> Result<Client, StorageError> {
        Err(StorageError::NotImplemented("get_client"))
    }

    async fn get_clients_matching(
        &self,
        _criteria: &ClientMatch,
    ) -> Result<ClientStream, StorageError> {
        Err(StorageError::NotImplemented("get_clients_matching"))
    }

    async fn set_client(&self, _client: &Client) -> Result<Client, StorageError> {
        Err(StorageError::NotImplemented("set_client"))
    }

    async fn set_client_alias(&self, _alias: &Alias) -> Result<Alias, StorageError> {
        Err(StorageError::NotImplemented("set_client_alias"))
    }

    async fn get_client_alias(&self, _key: &AliasKey) -> Result<Alias, StorageError> {
        Err(StorageError::NotImplemented("get_client_alias"))
    }

    async fn get_client_aliases(&self, _client_id: i64) -> Result<Vec<Alias>, StorageError> {
        Err(StorageError::NotImplemented("get_client_aliases"))
    }

    async fn set_client_ip_address(&self, _ip: &IpAddress) -> Result<IpAddress, StorageError> {
        Err(StorageError::NotImplemented("set_client_ip_address"))
    }

    async fn get_client_ip_address(
        &self,
        _key: &IpAddressKey,
    ) -> Result<IpAddress, StorageError> {
        Err(StorageError::NotImplemented("get_client_ip_address"))
    }

    async fn get_client_ip_addresses(
        &self,
        _client_id: i64,
    ) -> Result<Vec<IpAddress>, StorageError> {
        Err(StorageError::NotImplemented("get_client_ip_addresses"))
    }

    async fn set_client_penalty(&self, _penalty: &Penalty) -> Result<Penalty, StorageError> {
        Err(StorageError::NotImplemented("set_client_penalty"))
    }

    async fn get_client_penalty(&self, _id: i64) -> Result<Penalty, StorageError> {
        Err(StorageError::NotImplemented("get_client_penalty"))
    }

    async fn get_client_penalties(
        &self,
        _client_id: i64,
        _kind: Option<PenaltyKind>,
    ) -> Result<Vec<Penalty>, StorageError> {
        Err(StorageError::NotImplemented("get_client_penalties"))
    }

    async fn get_client_last_penalty(
        &self,
        _client_id: i64,
        _kind: Option<PenaltyKind>,
    ) -> Result<Penalty, StorageError> {
        Err(StorageError::NotImplemented("get_client_last_penalty"))
    }

    async fn get_client_first_penalty(
        &self,
        _client_id: i64,
        _kind: Option<PenaltyKind>,
    ) -> Result<Penalty, StorageError> {
        Err(StorageError::NotImplemented("get_client_first_penalty"))
    }

    async fn disable_client_penalties(
        &self,
        _client_id: i64,
        _kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError> {
        Err(StorageError::NotImplemented("disable_client_penalties"))
    }

    async fn num_penalties(
        &self,
        _client_id: i64,
        _kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError> {
        Err(StorageError::NotImplemented("num_penalties"))
    }

    async fn get_groups(&self) -> Result<Vec<Group>, StorageError> {
        Err(StorageError::NotImplemented("get_groups"))
    }

    async fn get_group(&self, _query: &GroupQuery) -> Result<Group, StorageError> {
        Err(StorageError::NotImplemented("get_group"))
    }

    async fn close(&self) {}
}
