use std::io::Write;

use bikeshop_core::DashboardSection;
use bikeshop_storefront::ClientState;

pub fn show(state: &ClientState, out: &mut impl Write) -> std::io::Result<()> {
    let active = state.dashboard().active();
    for section in DashboardSection::ALL {
        let marker = if section == active { "*" } else { " " };
        writeln!(out, "{marker} {section}")?;
    }
    Ok(())
}

pub fn set(
    state: &ClientState,
    out: &mut impl Write,
    section: DashboardSection,
) -> Result<(), Box<dyn std::error::Error>> {
    state.dashboard().set_active(section)?;
    writeln!(out, "Active dashboard section: {section}")?;
    Ok(())
}
