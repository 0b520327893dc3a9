//! # Domain Types
//!
//! Core domain types shared by every stage of the payment engine.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │   │ WicPrescription │   │ PaymentRequest  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  quantity       │   │  category       │   │  tender         │       │
//! │  │  unit_price     │   │  qty remaining  │   │  amount         │       │
//! │  │  tax_rate       │   │  brands / sizes │   │  prescriptions  │       │
//! │  │  paid amounts   │   └─────────────────┘   └─────────────────┘       │
//! │  │  derived tax    │                                                    │
//! │  └─────────────────┘   ┌─────────────────┐   ┌─────────────────┐       │
//! │                        │    TaxRate      │   │   TenderType    │       │
//! │                        │  ─────────────  │   │  ─────────────  │       │
//! │                        │  percent (dec)  │   │  Wic  Snap      │       │
//! │                        │  9.5 = 9.5%     │   │  EbtCash Cash   │       │
//! │                        └─────────────────┘   │  Credit Debit   │       │
//! │                                              │  Check          │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Frozen vs Running Fields
//! A `LineItem`'s price, quantity, rates and flags are frozen once payment
//! begins. The paid amounts change with each tender, and the tax fields are
//! always re-derived from the paid amounts by [`crate::recalc`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;
use crate::recalc;

// =============================================================================
// Tax Rate
// =============================================================================

/// Combined sales tax rate, stored as a percentage.
///
/// ## Why a Decimal Percent?
/// Combined state + county + district rates are quoted as percentages with
/// up to three places (e.g. 9.375%). Basis points cannot carry that exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Creates a tax rate from a percentage (`dec!(9.5)` = 9.5%).
    #[inline]
    pub fn from_percent(percent: Decimal) -> Self {
        TaxRate(percent)
    }

    /// Creates a tax rate from basis points (825 = 8.25%).
    #[inline]
    pub fn from_bps(bps: u32) -> Self {
        TaxRate(Decimal::new(bps as i64, 2))
    }

    /// Returns the rate as a percentage.
    #[inline]
    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

// =============================================================================
// Tender Type
// =============================================================================

/// A payment instrument.
///
/// ## Routing
/// ```text
/// Wic ────────────────► WicAllocator      (tax-exempt, prescription bound)
/// Snap ───────────────► SnapAllocator     (tax-exempt, taxable lines first)
/// EbtCash/Cash/Credit/
///   Debit/Check ──────► RegularAllocator  (no tax effect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderType {
    /// WIC benefit card.
    Wic,
    /// SNAP/EBT food stamps.
    Snap,
    /// EBT cash benefit (taxable, behaves like cash).
    EbtCash,
    /// Physical cash.
    Cash,
    /// Credit card.
    Credit,
    /// Debit card.
    Debit,
    /// Paper check.
    Check,
}

impl TenderType {
    /// Every tender, in the recommended cashier order.
    pub const ALL: [TenderType; 7] = [
        TenderType::Wic,
        TenderType::Snap,
        TenderType::EbtCash,
        TenderType::Cash,
        TenderType::Credit,
        TenderType::Debit,
        TenderType::Check,
    ];

    /// Returns true for WIC and SNAP, the tenders that exempt what they pay
    /// from sales tax.
    pub fn is_benefit(&self) -> bool {
        matches!(self, TenderType::Wic | TenderType::Snap)
    }

    /// Returns true if over-tendering this instrument hands change back.
    pub fn gives_change(&self) -> bool {
        matches!(self, TenderType::Cash | TenderType::EbtCash)
    }

    /// Returns true if this tender is settled on the card terminal.
    pub fn uses_terminal(&self) -> bool {
        matches!(
            self,
            TenderType::EbtCash | TenderType::Credit | TenderType::Debit | TenderType::Check
        )
    }
}

impl fmt::Display for TenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenderType::Wic => write!(f, "wic"),
            TenderType::Snap => write!(f, "snap"),
            TenderType::EbtCash => write!(f, "ebt_cash"),
            TenderType::Cash => write!(f, "cash"),
            TenderType::Credit => write!(f, "credit"),
            TenderType::Debit => write!(f, "debit"),
            TenderType::Check => write!(f, "check"),
        }
    }
}

impl FromStr for TenderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wic" => Ok(TenderType::Wic),
            "snap" | "ebt" | "ebt_food" | "food_stamps" => Ok(TenderType::Snap),
            "ebt_cash" | "ebtcash" => Ok(TenderType::EbtCash),
            "cash" => Ok(TenderType::Cash),
            "credit" => Ok(TenderType::Credit),
            "debit" => Ok(TenderType::Debit),
            "check" => Ok(TenderType::Check),
            _ => Err(ValidationError::NotAllowed {
                field: "tender".to_string(),
                allowed: TenderType::ALL.iter().map(|t| t.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One sellable line in the transaction.
///
/// ## Amount Anatomy
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  gross_extended_price = (unit_price - discount + crv) × quantity        │
/// │                                                                         │
/// │  ├── snap_paid_amount        ┐                                          │
/// │  ├── wic_paid_amount         ├─ sum ≤ gross_extended_price (always)     │
/// │  ├── non_benefit_paid_amount ┘                                          │
/// │  └── (unpaid)                                                           │
/// │                                                                         │
/// │  subject_to_tax_total = gross - min(gross, snap + wic)                  │
/// │  tax_per_unit = round(subject_to_tax_total / qty × rate, 2)             │
/// │  tax_total    = tax_per_unit × quantity                                 │
/// │  tax_paid_amount ≤ tax_total   (settled by non-benefit tenders)         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line identifier, unique within the transaction.
    pub id: String,

    /// Display name (receipt and logs).
    pub name: String,

    /// Units sold.
    pub quantity: i64,

    /// Shelf price per unit.
    pub unit_price: Money,

    /// Discount per unit, already netted out of the taxable basis.
    pub discount_per_unit: Money,

    /// Container deposit (CRV) per unit. Always taxable.
    pub crv_per_unit: Money,

    /// Combined tax rate for this line.
    pub tax_rate: TaxRate,

    /// Product may be paid with SNAP.
    pub is_snap_eligible: bool,

    /// Product is on the WIC approved product list.
    pub is_wic_approved: bool,

    /// WIC category the product counts against (e.g. "milk").
    pub wic_category: Option<String>,

    /// Brand, checked against a prescription's brand allow-list.
    pub brand: Option<String>,

    /// Package size, checked against a prescription's size allow-list.
    pub size: Option<String>,

    /// Amount paid by SNAP.
    pub snap_paid_amount: Money,

    /// Amount paid by WIC.
    pub wic_paid_amount: Money,

    /// Merchandise amount settled by regular tenders.
    pub non_benefit_paid_amount: Money,

    /// Tax amount settled by regular tenders.
    pub tax_paid_amount: Money,

    /// Derived: rounded tax per unit.
    pub tax_per_unit: Money,

    /// Derived: `tax_per_unit × quantity`.
    pub tax_total: Money,

    /// Derived: the portion of the gross still subject to tax.
    pub subject_to_tax_total: Money,
}

impl LineItem {
    /// Creates an untaxed, non-benefit line with nothing paid.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal_macros::dec;
    /// use tender_core::{LineItem, Money, TaxRate};
    ///
    /// let soda = LineItem::new("2", "Soda", 1, Money::from_cents(259))
    ///     .with_tax_rate(TaxRate::from_percent(dec!(9.5)))
    ///     .snap_eligible();
    ///
    /// assert_eq!(soda.tax_total.cents(), 25);
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        let line = LineItem {
            id: id.into(),
            name: name.into(),
            quantity,
            unit_price,
            discount_per_unit: Money::zero(),
            crv_per_unit: Money::zero(),
            tax_rate: TaxRate::zero(),
            is_snap_eligible: false,
            is_wic_approved: false,
            wic_category: None,
            brand: None,
            size: None,
            snap_paid_amount: Money::zero(),
            wic_paid_amount: Money::zero(),
            non_benefit_paid_amount: Money::zero(),
            tax_paid_amount: Money::zero(),
            tax_per_unit: Money::zero(),
            tax_total: Money::zero(),
            subject_to_tax_total: Money::zero(),
        };
        recalc::recalculate_line(&line)
    }

    /// Sets the per-unit discount.
    pub fn with_discount(mut self, discount_per_unit: Money) -> Self {
        self.discount_per_unit = discount_per_unit;
        recalc::recalculate_line(&self)
    }

    /// Sets the per-unit CRV deposit.
    pub fn with_crv(mut self, crv_per_unit: Money) -> Self {
        self.crv_per_unit = crv_per_unit;
        recalc::recalculate_line(&self)
    }

    /// Sets the combined tax rate.
    pub fn with_tax_rate(mut self, tax_rate: TaxRate) -> Self {
        self.tax_rate = tax_rate;
        recalc::recalculate_line(&self)
    }

    /// Marks the line SNAP eligible.
    pub fn snap_eligible(mut self) -> Self {
        self.is_snap_eligible = true;
        self
    }

    /// Marks the line WIC approved under `category`.
    pub fn wic_approved(mut self, category: impl Into<String>) -> Self {
        self.is_wic_approved = true;
        self.wic_category = Some(category.into());
        self
    }

    /// Sets the brand.
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Sets the package size.
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Price after discount, per unit, without CRV.
    #[inline]
    pub fn net_unit_price(&self) -> Money {
        self.unit_price - self.discount_per_unit
    }

    /// Merchandise total: `(unit_price - discount) × quantity`.
    #[inline]
    pub fn merchandise_total(&self) -> Money {
        self.net_unit_price().multiply_quantity(self.quantity)
    }

    /// Discount total: `discount × quantity`.
    #[inline]
    pub fn discount_total(&self) -> Money {
        self.discount_per_unit.multiply_quantity(self.quantity)
    }

    /// CRV total: `crv × quantity`.
    #[inline]
    pub fn crv_total(&self) -> Money {
        self.crv_per_unit.multiply_quantity(self.quantity)
    }

    /// What the line costs before tax: merchandise plus CRV.
    #[inline]
    pub fn gross_extended_price(&self) -> Money {
        self.merchandise_total() + self.crv_total()
    }

    /// SNAP + WIC paid.
    #[inline]
    pub fn benefit_paid(&self) -> Money {
        self.snap_paid_amount + self.wic_paid_amount
    }

    /// Everything paid toward the gross (excludes tax paid).
    #[inline]
    pub fn merchandise_paid(&self) -> Money {
        self.benefit_paid() + self.non_benefit_paid_amount
    }

    /// Gross not yet covered by any tender.
    #[inline]
    pub fn merchandise_due(&self) -> Money {
        self.gross_extended_price().saturating_sub(self.merchandise_paid())
    }

    /// Tax not yet covered by a regular tender.
    #[inline]
    pub fn tax_due(&self) -> Money {
        self.tax_total.saturating_sub(self.tax_paid_amount)
    }

    /// Line has a non-zero tax rate.
    #[inline]
    pub fn is_taxable(&self) -> bool {
        !self.tax_rate.is_zero()
    }

    /// Returns a copy with every paid amount cleared and tax re-derived.
    pub fn unpaid(&self) -> Self {
        let mut line = self.clone();
        line.snap_paid_amount = Money::zero();
        line.wic_paid_amount = Money::zero();
        line.non_benefit_paid_amount = Money::zero();
        line.tax_paid_amount = Money::zero();
        recalc::recalculate_line(&line)
    }
}

// =============================================================================
// WIC Prescription
// =============================================================================

/// A customer's remaining WIC benefit for one food category.
///
/// Supplied by the WIC card service per payment attempt; the engine never
/// owns prescriptions, it only returns decremented copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WicPrescription {
    /// Food category (matches `LineItem::wic_category`).
    pub category: String,

    /// Units the customer may still buy in this category.
    pub allowed_quantity_remaining: i64,

    /// Brand allow-list. Empty means any brand.
    #[serde(default)]
    pub allowed_brands: Vec<String>,

    /// Size allow-list. Empty means any size.
    #[serde(default)]
    pub allowed_sizes: Vec<String>,
}

impl WicPrescription {
    /// Creates an unrestricted prescription.
    pub fn new(category: impl Into<String>, allowed_quantity_remaining: i64) -> Self {
        WicPrescription {
            category: category.into(),
            allowed_quantity_remaining,
            allowed_brands: Vec::new(),
            allowed_sizes: Vec::new(),
        }
    }

    /// Restricts the prescription to the given brands.
    pub fn with_brands<I, S>(mut self, brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_brands = brands.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the prescription to the given sizes.
    pub fn with_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    /// Category match, ignoring case and surrounding whitespace.
    pub fn covers_category(&self, category: &str) -> bool {
        self.category.trim().eq_ignore_ascii_case(category.trim())
    }

    /// True when the brand passes the allow-list (empty list allows all).
    pub fn allows_brand(&self, brand: Option<&str>) -> bool {
        allow_listed(&self.allowed_brands, brand)
    }

    /// True when the size passes the allow-list (empty list allows all).
    pub fn allows_size(&self, size: Option<&str>) -> bool {
        allow_listed(&self.allowed_sizes, size)
    }
}

fn allow_listed(list: &[String], value: Option<&str>) -> bool {
    if list.is_empty() {
        return true;
    }
    match value {
        Some(v) => list.iter().any(|allowed| allowed.trim().eq_ignore_ascii_case(v.trim())),
        None => false,
    }
}

/// Finds the prescription for a category.
pub fn prescription_for<'a>(
    prescriptions: &'a [WicPrescription],
    category: &str,
) -> Option<&'a WicPrescription> {
    prescriptions.iter().find(|rx| rx.covers_category(category))
}

// =============================================================================
// Payment Request
// =============================================================================

/// A request to apply one tender to the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub tender: TenderType,
    pub amount: Money,
    /// Current prescriptions from the WIC card. Only read for `Wic`.
    #[serde(default)]
    pub prescriptions: Vec<WicPrescription>,
}

impl PaymentRequest {
    /// Creates a request for any tender.
    pub fn new(tender: TenderType, amount: Money) -> Self {
        PaymentRequest {
            tender,
            amount,
            prescriptions: Vec::new(),
        }
    }

    /// Creates a WIC request carrying the card's current prescriptions.
    pub fn wic(amount: Money, prescriptions: Vec<WicPrescription>) -> Self {
        PaymentRequest {
            tender: TenderType::Wic,
            amount,
            prescriptions,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
