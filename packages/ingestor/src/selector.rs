//! Method Selector Tables
//!
//! Known 4-byte function selectors grouped into swap, mint and burn categories.
//! Targets Uniswap V2/V3 style routers and common ERC20 mint/burn entry points.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

/// A 4-byte function selector
pub type Selector = [u8; 4];

/// Category a known selector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorCategory {
    Swap,
    Mint,
    Burn,
}

impl SelectorCategory {
    /// Categories in match priority order
    pub const PRIORITY: [SelectorCategory; 3] =
        [SelectorCategory::Swap, SelectorCategory::Mint, SelectorCategory::Burn];
}

impl fmt::Display for SelectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectorCategory::Swap => "swap",
            SelectorCategory::Mint => "mint",
            SelectorCategory::Burn => "burn",
        };
        f.write_str(name)
    }
}

/// A selector shipped in the default tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownSelector {
    pub selector: Selector,
    pub category: SelectorCategory,
    pub name: &'static str,
}

impl KnownSelector {
    const fn new(selector: Selector, category: SelectorCategory, name: &'static str) -> Self {
        Self { selector, category, name }
    }

    /// Returns the hex-encoded selector with 0x prefix
    pub fn hex(&self) -> String {
        format_selector(&self.selector)
    }
}

/// Default selector tables
pub const KNOWN_SELECTORS: &[KnownSelector] = &[
    // swap
    KnownSelector::new([0x38, 0xed, 0x17, 0x39], SelectorCategory::Swap, "swapExactTokensForTokens"),
    KnownSelector::new([0x7f, 0xf3, 0x6a, 0xb5], SelectorCategory::Swap, "swapExactETHForTokens"),
    KnownSelector::new([0x18, 0xcb, 0xaf, 0xe5], SelectorCategory::Swap, "swapExactTokensForETH"),
    KnownSelector::new([0x88, 0x03, 0xdb, 0xee], SelectorCategory::Swap, "swapTokensForExactTokens"),
    KnownSelector::new([0x02, 0x75, 0x1c, 0xec], SelectorCategory::Swap, "removeLiquidityETH"),
    KnownSelector::new(
        [0x79, 0x1a, 0xc9, 0x47],
        SelectorCategory::Swap,
        "swapExactTokensForETHSupportingFeeOnTransferTokens",
    ),
    KnownSelector::new(
        [0xb6, 0xf9, 0xde, 0x95],
        SelectorCategory::Swap,
        "swapExactETHForTokensSupportingFeeOnTransferTokens",
    ),
    KnownSelector::new(
        [0x5c, 0x11, 0xd7, 0x95],
        SelectorCategory::Swap,
        "swapExactTokensForTokensSupportingFeeOnTransferTokens",
    ),
    KnownSelector::new([0x12, 0x8a, 0xcb, 0x08], SelectorCategory::Swap, "swap"),
    KnownSelector::new([0xfb, 0x3b, 0xdb, 0x41], SelectorCategory::Swap, "swapETHForExactTokens"),
    // mint
    KnownSelector::new([0x40, 0xc1, 0x0f, 0x19], SelectorCategory::Mint, "mint(address,uint256)"),
    KnownSelector::new([0xa0, 0x71, 0x2d, 0x68], SelectorCategory::Mint, "mint(uint256)"),
    KnownSelector::new([0x12, 0x49, 0xc5, 0x8b], SelectorCategory::Mint, "mint()"),
    // burn
    KnownSelector::new([0x42, 0x96, 0x6c, 0x68], SelectorCategory::Burn, "burn(uint256)"),
    KnownSelector::new([0x9d, 0xc2, 0x9f, 0xac], SelectorCategory::Burn, "burn(address,uint256)"),
    KnownSelector::new([0x8d, 0x12, 0x47, 0xba], SelectorCategory::Burn, "burn(address,uint256,bytes)"),
];

/// Static lookup table for method names
static METHOD_NAMES: LazyLock<HashMap<Selector, &'static str>> = LazyLock::new(|| {
    KNOWN_SELECTORS
        .iter()
        .map(|known| (known.selector, known.name))
        .collect()
});

/// Get the human-readable method name for a given selector
///
/// # Arguments
/// * `selector` - The first 4 bytes of the transaction input data
///
/// # Returns
/// `Some(&str)` with the method name if known, `None` otherwise
pub fn method_name(selector: &Selector) -> Option<&'static str> {
    METHOD_NAMES.get(selector).copied()
}

/// Swap, mint and burn selector sets used by the classifier
///
/// Starts from [`KNOWN_SELECTORS`] and can be extended with extra selectors
/// per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSets {
    swap: HashSet<Selector>,
    mint: HashSet<Selector>,
    burn: HashSet<Selector>,
}

impl Default for SelectorSets {
    fn default() -> Self {
        let mut sets = Self::empty();
        for known in KNOWN_SELECTORS {
            sets.insert(known.category, known.selector);
        }
        sets
    }
}

impl SelectorSets {
    /// Sets with no selectors at all
    pub fn empty() -> Self {
        Self {
            swap: HashSet::new(),
            mint: HashSet::new(),
            burn: HashSet::new(),
        }
    }

    /// Add a selector to a category
    pub fn insert(&mut self, category: SelectorCategory, selector: Selector) {
        self.set_mut(category).insert(selector);
    }

    /// Add every selector in `selectors` to a category
    pub fn extend(&mut self, category: SelectorCategory, selectors: impl IntoIterator<Item = Selector>) {
        self.set_mut(category).extend(selectors);
    }

    /// Check whether a category contains the selector
    pub fn contains(&self, category: SelectorCategory, selector: &Selector) -> bool {
        self.set(category).contains(selector)
    }

    /// Find the category of a selector, checking swap, then mint, then burn
    pub fn category(&self, selector: &Selector) -> Option<SelectorCategory> {
        SelectorCategory::PRIORITY
            .into_iter()
            .find(|category| self.contains(*category, selector))
    }

    /// Number of selectors in a category
    pub fn len(&self, category: SelectorCategory) -> usize {
        self.set(category).len()
    }

    fn set(&self, category: SelectorCategory) -> &HashSet<Selector> {
        match category {
            SelectorCategory::Swap => &self.swap,
            SelectorCategory::Mint => &self.mint,
            SelectorCategory::Burn => &self.burn,
        }
    }

    fn set_mut(&mut self, category: SelectorCategory) -> &mut HashSet<Selector> {
        match category {
            SelectorCategory::Swap => &mut self.swap,
            SelectorCategory::Mint => &mut self.mint,
            SelectorCategory::Burn => &mut self.burn,
        }
    }
}

/// Extract the selector from hex call-data as returned by a JSON-RPC node
///
/// Requires the `0x` prefix and at least 8 hex digits after it. Hex digits
/// are matched case-insensitively.
pub fn selector_from_call_data(data: &str) -> Option<Selector> {
    let head = data.get(..10)?;
    let digits = head.strip_prefix("0x").or_else(|| head.strip_prefix("0X"))?;
    let mut selector = [0u8; 4];
    hex::decode_to_slice(digits, &mut selector).ok()?;
    Some(selector)
}

/// Parse a single `0x`-prefixed selector such as `0x38ed1739`
pub fn parse_selector(text: &str) -> Option<Selector> {
    let text = text.trim();
    if text.len() != 10 {
        return None;
    }
    selector_from_call_data(text)
}

/// Format a selector as a lowercase hex string with 0x prefix
pub fn format_selector(selector: &Selector) -> String {
    format!("0x{}", hex::encode(selector))
}
