use x86_64::structures::gdt::{GlobalDescriptorTable, Descriptor, SegmentSelector};
use lazy_static::lazy_static;

lazy_static! {
    static ref GDT: (GlobalDescriptorTable, SegmentSelector) = build();
}

/// Null descriptor followed by one kernel code segment, so the code
/// selector comes out as 0x08.
fn build() -> (GlobalDescriptorTable, SegmentSelector) {
    let mut gdt = GlobalDescriptorTable::new();
    let code_selector = gdt.append(Descriptor::kernel_code_segment());
    (gdt, code_selector)
}

/// Load the GDT and reload CS. Returns the selector interrupt gates must use.
pub fn init() -> SegmentSelector {
    use x86_64::instructions::segmentation::{CS, Segment};

    GDT.0.load();
    unsafe {
        CS::set_reg(GDT.1);
    }
    GDT.1
}
