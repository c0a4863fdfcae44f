//! Customer and order ingestion plus the read-side data endpoints.
//!
//! Batches are processed record by record; a bad record is reported in the
//! results and the rest of the batch still goes through.

use chrono::Utc;
use reach_core::store::{CustomerRepository, OrderRepository, Page};
use reach_core::types::{normalize_email, Customer, Order};
use reach_core::{ReachError, ReachResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::*;

pub struct DataService {
    customers: Arc<dyn CustomerRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl DataService {
    pub fn new(customers: Arc<dyn CustomerRepository>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { customers, orders }
    }

    /// Create customers by email, or update the fields a record provides
    /// when the email already exists. Records are decoded one at a time, so
    /// a malformed record only fails itself.
    pub async fn upsert_customers(&self, records: Vec<Value>) -> IngestResponse<CustomerResult> {
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        for record in records {
            let email = string_field(&record, "email");
            let outcome = match decode::<CustomerInput>(record) {
                Ok(input) => self.upsert_customer(input).await,
                Err(e) => Err(e),
            };
            let result = match outcome {
                Ok(r) => r,
                Err(e) => {
                    warn!(email = ?email, error = %e, "Customer record rejected");
                    CustomerResult::Error {
                        email,
                        error: e.to_string(),
                    }
                }
            };
            results.push(result);
        }

        let count = |f: fn(&CustomerResult) -> bool| results.iter().filter(|r| f(r)).count();
        let summary = IngestSummary {
            total,
            created: count(|r| matches!(r, CustomerResult::Created { .. })),
            updated: Some(count(|r| matches!(r, CustomerResult::Updated { .. }))),
            errors: count(|r| matches!(r, CustomerResult::Error { .. })),
        };
        metrics::counter!("reach.ingest.customers").increment(total as u64);
        info!(
            total,
            created = summary.created,
            updated = summary.updated,
            errors = summary.errors,
            "Customer batch ingested"
        );
        IngestResponse {
            success: true,
            message: format!("Processed {total} customer(s)"),
            results,
            summary,
        }
    }

    async fn upsert_customer(&self, input: CustomerInput) -> ReachResult<CustomerResult> {
        let email = input
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ReachError::Validation("email is required".into()))?;

        if let Some(spends) = input.total_spends {
            if !spends.is_finite() || spends < 0.0 {
                return Err(ReachError::Validation(
                    "totalSpends must be a non-negative number".into(),
                ));
            }
        }

        if let Some(mut existing) = self.customers.find_customer_by_email(&email).await? {
            if let Some(name) = input.name.filter(|n| !n.trim().is_empty()) {
                existing.name = name.trim().to_string();
            }
            if input.phone.is_some() {
                existing.phone = input.phone;
            }
            if let Some(spends) = input.total_spends {
                existing.total_spends = spends;
            }
            if let Some(visits) = input.visits {
                existing.visits = visits;
            }
            if let Some(last_visit) = input.last_visit {
                existing.last_visit = last_visit;
            }
            existing.updated_at = Utc::now();
            let customer = self.customers.save_customer(existing).await?;
            return Ok(CustomerResult::Updated { customer });
        }

        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ReachError::Validation("name is required".into()))?;
        let now = Utc::now();
        let mut customer = Customer::new(name, &email, now);
        customer.phone = input.phone;
        customer.total_spends = input.total_spends.unwrap_or(0.0);
        customer.visits = input.visits.unwrap_or(0);
        customer.last_visit = input.last_visit.unwrap_or(now);
        let customer = self.customers.insert_customer(customer).await?;
        Ok(CustomerResult::Created { customer })
    }

    /// Store orders and roll each into its customer's spend, visits and
    /// last visit.
    pub async fn ingest_orders(&self, records: Vec<Value>) -> IngestResponse<OrderResult> {
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        for record in records {
            let customer_email = string_field(&record, "customerEmail");
            let outcome = match decode::<OrderInput>(record) {
                Ok(input) => self.ingest_order(input).await,
                Err(e) => Err(e),
            };
            let result = match outcome {
                Ok(order) => OrderResult::Created { order },
                Err(e) => {
                    warn!(customer_email = ?customer_email, error = %e, "Order record rejected");
                    OrderResult::Error {
                        customer_email,
                        error: e.to_string(),
                    }
                }
            };
            results.push(result);
        }

        let created = results
            .iter()
            .filter(|r| matches!(r, OrderResult::Created { .. }))
            .count();
        let summary = IngestSummary {
            total,
            created,
            updated: None,
            errors: total - created,
        };
        metrics::counter!("reach.ingest.orders").increment(total as u64);
        info!(total, created, errors = summary.errors, "Order batch ingested");
        IngestResponse {
            success: true,
            message: format!("Processed {total} order(s)"),
            results,
            summary,
        }
    }

    async fn ingest_order(&self, input: OrderInput) -> ReachResult<Order> {
        let email = input
            .customer_email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ReachError::Validation("customerEmail is required".into()))?;
        let amount = input
            .order_amount
            .filter(|a| a.is_finite() && *a >= 0.0)
            .ok_or_else(|| ReachError::Validation("orderAmount must be a non-negative number".into()))?;
        let mut customer = self
            .customers
            .find_customer_by_email(&email)
            .await?
            .ok_or_else(|| ReachError::not_found("customer", &email))?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            customer_email: email,
            order_amount: amount,
            order_date: input.order_date.unwrap_or(now),
            status: input.status.unwrap_or_default(),
            products: input.products,
            created_at: now,
        };
        let order = self.orders.insert_order(order).await?;

        customer.total_spends += amount;
        customer.visits += 1;
        customer.last_visit = order.order_date;
        customer.updated_at = now;
        self.customers.save_customer(customer).await?;
        Ok(order)
    }

    /// Customers newest first, filtered by a case-insensitive name/email
    /// search and a spend range.
    pub async fn list_customers(&self, query: &CustomerQuery) -> ReachResult<CustomerList> {
        let search = query.search.as_deref().map(str::to_lowercase);
        let (min, max) = (query.min_spend, query.max_spend);
        let filter = |c: &Customer| {
            let matches_search = search.as_deref().map_or(true, |s| {
                c.name.to_lowercase().contains(s) || c.email.contains(s)
            });
            matches_search
                && min.map_or(true, |m| c.total_spends >= m)
                && max.map_or(true, |m| c.total_spends <= m)
        };

        let total = self.customers.count_customers(&filter).await? as usize;
        let customers = self
            .customers
            .find_customers(&filter, newest_page(query.page, query.limit))
            .await?;
        Ok(CustomerList {
            customers,
            pagination: Pagination::new(query.page.max(1), total, query.limit),
        })
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> ReachResult<OrderList> {
        let email = query.customer_email.as_deref();
        let total = self.orders.list_orders(email, Page::all()).await?.len();
        let orders = self
            .orders
            .list_orders(email, skip_page(query.page, query.limit))
            .await?;
        Ok(OrderList {
            orders,
            pagination: Pagination::new(query.page.max(1), total, query.limit),
        })
    }

    pub async fn stats(&self) -> ReachResult<DataStats> {
        let customers = self.customers.find_customers(&|_| true, Page::all()).await?;
        let orders = self.orders.list_orders(None, Page::all()).await?;

        let total_spends: f64 = customers.iter().map(|c| c.total_spends).sum();
        let total_revenue: f64 = orders.iter().map(|o| o.order_amount).sum();
        Ok(DataStats {
            customers: CustomerStats {
                total: customers.len() as u64,
                total_spends,
                average_spends: average(total_spends, customers.len()),
                total_visits: customers.iter().map(|c| c.visits).sum(),
            },
            orders: OrderStats {
                total: orders.len() as u64,
                total_revenue,
                average_order_value: average(total_revenue, orders.len()),
            },
        })
    }
}

fn decode<T: DeserializeOwned>(record: Value) -> ReachResult<T> {
    serde_json::from_value(record).map_err(|e| ReachError::Validation(format!("invalid record: {e}")))
}

fn string_field(record: &Value, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(String::from)
}

fn average(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn skip_page(page: usize, limit: usize) -> Page {
    Page {
        skip: page.max(1).saturating_sub(1).saturating_mul(limit),
        limit: Some(limit),
        newest_first: false,
    }
}

fn newest_page(page: usize, limit: usize) -> Page {
    Page {
        newest_first: true,
        ..skip_page(page, limit)
    }
}
