use alloy::sol;

sol! {
    #[derive(Debug)]
    PanelRegistry,
    "src/contract/abis/PanelRegistry.json"
}

// First deployment of the registry: no attestor, free-form severity.
sol! {
    #[derive(Debug)]
    contract LegacyPanelRegistry {
        event PanelEventAdded(
            string panelId,
            string eventType,
            string faultType,
            string faultSeverity,
            string actionTaken,
            bytes32 eventHash,
            uint256 timestamp
        );
    }
}
