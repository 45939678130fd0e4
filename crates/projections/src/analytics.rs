//! Marketing analytics: the four views behind one query facade.

use std::sync::Arc;

use domain::Money;
use serde::Serialize;

use crate::projection::Projection;
use crate::views::{
    CustomerSummary, CustomerSummaryView, DailySales, DailySalesView, OrderSnapshotView,
    ProductPopularity, ProductPopularityView,
};

const TOP_CUSTOMERS: usize = 5;
const TOP_PRODUCTS: usize = 5;
const RECENT_DAYS: usize = 7;

/// Dashboard numbers aggregated across the views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesOverview {
    /// Sum of all customers' revenue.
    pub total_revenue: Money,
    pub total_customers: usize,
    pub total_product_types: usize,
    pub top_customers: Vec<CustomerSummary>,
    pub top_products: Vec<ProductPopularity>,
    pub recent_daily_sales: Vec<DailySales>,
}

/// Owns the analytics views. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct SalesAnalytics {
    pub orders: OrderSnapshotView,
    pub customers: CustomerSummaryView,
    pub products: ProductPopularityView,
    pub daily_sales: DailySalesView,
}

impl SalesAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// The views as projections, ready for a subscriber or processor.
    pub fn projections(&self) -> Vec<Arc<dyn Projection>> {
        vec![
            Arc::new(self.orders.clone()),
            Arc::new(self.customers.clone()),
            Arc::new(self.products.clone()),
            Arc::new(self.daily_sales.clone()),
        ]
    }

    pub async fn overview(&self) -> SalesOverview {
        let customers = self.customers.list().await;
        let products = self.products.list().await;

        SalesOverview {
            total_revenue: customers.iter().map(|c| c.total_revenue).sum(),
            total_customers: customers.len(),
            total_product_types: products.len(),
            top_customers: customers.into_iter().take(TOP_CUSTOMERS).collect(),
            top_products: products.into_iter().take(TOP_PRODUCTS).collect(),
            recent_daily_sales: self.daily_sales.recent(RECENT_DAYS).await,
        }
    }
}
