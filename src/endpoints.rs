//! Path catalogue for the back-office API, relative to the configured base URL.

/// Authentication endpoints.
pub mod auth {
	/// `POST` credentials, receive a token and the user.
	pub const LOGIN: &str = "/auth/login";
	/// `POST` to end the server-side session.
	pub const LOGOUT: &str = "/auth/logout";
	/// `POST` an empty body to exchange the session cookie for a new access token.
	pub const REFRESH: &str = "/auth/refresh";
	/// `GET` the authenticated user.
	pub const ME: &str = "/auth/me";
}

/// Dashboard endpoints.
pub mod dashboard {
	/// Aggregated dashboard statistics.
	pub const STATS: &str = "/admin/dashboard";
}

/// Product endpoints.
pub mod products {
	/// List or create products.
	pub const LIST: &str = "/admin/products";
	/// Delete several products at once.
	pub const BULK_DELETE: &str = "/admin/products/bulk-delete";

	/// Single product.
	pub fn item(id: u64) -> String {
		format!("{LIST}/{id}")
	}

	/// Upload images for a product.
	pub fn images(id: u64) -> String {
		format!("{LIST}/{id}/images")
	}

	/// Single product image.
	pub fn image(product_id: u64, image_id: u64) -> String {
		format!("{LIST}/{product_id}/images/{image_id}")
	}
}

/// Category endpoints.
pub mod categories {
	/// List or create categories.
	pub const LIST: &str = "/admin/categories";

	/// Single category.
	pub fn item(id: u64) -> String {
		format!("{LIST}/{id}")
	}
}

/// Order endpoints.
pub mod orders {
	/// List orders.
	pub const LIST: &str = "/admin/orders";
	/// Order statistics.
	pub const STATS: &str = "/admin/orders/stats";

	/// Single order.
	pub fn item(id: u64) -> String {
		format!("{LIST}/{id}")
	}

	/// Update an order's status.
	pub fn status(id: u64) -> String {
		format!("{LIST}/{id}/status")
	}
}

/// Customer endpoints.
pub mod customers {
	/// List customers.
	pub const LIST: &str = "/admin/customers";

	/// Single customer.
	pub fn item(id: u64) -> String {
		format!("{LIST}/{id}")
	}

	/// Orders placed by a customer.
	pub fn orders(id: u64) -> String {
		format!("{LIST}/{id}/orders")
	}
}

/// Shipping endpoints.
pub mod shipping {
	/// List or create shipments.
	pub const LIST: &str = "/admin/shipping";
	/// Shipping rate quotes.
	pub const RATES: &str = "/admin/shipping/rates";

	/// Tracking information for a shipment.
	pub fn track(id: u64) -> String {
		format!("{LIST}/{id}/track")
	}
}

/// Report endpoints.
pub mod reports {
	/// Sales report.
	pub const SALES: &str = "/admin/reports/sales";
	/// Product report.
	pub const PRODUCTS: &str = "/admin/reports/products";
	/// Customer report.
	pub const CUSTOMERS: &str = "/admin/reports/customers";
	/// Report export.
	pub const EXPORT: &str = "/admin/reports/export";
}

/// Settings endpoints.
pub mod settings {
	/// Read or update all settings.
	pub const ALL: &str = "/admin/settings";
	/// General store settings.
	pub const GENERAL: &str = "/admin/settings/general";
	/// Shipping settings.
	pub const SHIPPING: &str = "/admin/settings/shipping";
	/// Payment settings.
	pub const PAYMENT: &str = "/admin/settings/payment";
}

/// File upload endpoints.
pub mod upload {
	/// Upload a single image.
	pub const IMAGE: &str = "/admin/upload/image";
	/// Upload several images.
	pub const IMAGES: &str = "/admin/upload/images";
}
