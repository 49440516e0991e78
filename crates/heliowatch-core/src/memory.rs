// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelioWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! In-memory store, used by tests and demo setups without a database

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use heliowatch_types::{Device, FaultRecord};

use crate::errors::CoreResult;
use crate::traits::{DeviceStore, FaultStore};

#[derive(Debug, Default)]
struct MemoryInner {
    next_device_id: i64,
    next_record_id: i64,
    devices: Vec<Device>,
    records: Vec<FaultRecord>,
}

/// Process-local implementation of both store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn insert(&self, mut device: Device) -> CoreResult<Device> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        inner.next_device_id += 1;
        device.id = inner.next_device_id;
        inner.devices.push(device.clone());
        Ok(device)
    }

    async fn get(&self, user_id: &str, device_id: i64) -> CoreResult<Option<Device>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner
            .devices
            .iter()
            .find(|device| device.id == device_id && device.user_id == user_id)
            .cloned())
    }

    async fn find_by_serial(&self, serial: &str) -> CoreResult<Option<Device>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner
            .devices
            .iter()
            .find(|device| device.serial == serial)
            .cloned())
    }

    async fn list(&self, user_id: &str) -> CoreResult<Vec<Device>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let mut devices: Vec<Device> = inner
            .devices
            .iter()
            .filter(|device| device.user_id == user_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(devices)
    }

    async fn update(&self, device: &Device) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        if let Some(existing) = inner
            .devices
            .iter_mut()
            .find(|candidate| candidate.id == device.id)
        {
            *existing = device.clone();
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str, device_id: i64) -> CoreResult<bool> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        let before = inner.devices.len();
        inner
            .devices
            .retain(|device| !(device.id == device_id && device.user_id == user_id));
        Ok(inner.devices.len() < before)
    }
}

#[async_trait]
impl FaultStore for MemoryStore {
    async fn append(&self, mut record: FaultRecord) -> CoreResult<FaultRecord> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        inner.next_record_id += 1;
        record.id = inner.next_record_id;
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn for_day(
        &self,
        user_id: &str,
        device_id: i64,
        date: Option<NaiveDate>,
        limit: usize,
    ) -> CoreResult<Vec<FaultRecord>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        let mut records: Vec<FaultRecord> = inner
            .records
            .iter()
            .filter(|record| record.device_id == device_id && record.user_id == user_id)
            .filter(|record| date.is_none_or(|day| record.timestamp.date_naive() == day))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    async fn latest(&self, user_id: &str, device_id: i64) -> CoreResult<Option<FaultRecord>> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner
            .records
            .iter()
            .filter(|record| record.device_id == device_id && record.user_id == user_id)
            .max_by_key(|record| record.timestamp)
            .cloned())
    }
}
