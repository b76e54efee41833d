//! Variables whose value is dropped for external programs when it points
//! into the bundle.
//!
//! These are toolkit plugin/module search paths, audio, locale and graphics
//! driver directories, interpreter homes and loader paths.  A bundle exports
//! them so its own copies are found; a system program handed the same values
//! would load the bundle's private modules against the system's libraries.

pub(crate) const DENYLIST: &[&str] = &[
    "BABL_PATH",
    "__EGL_VENDOR_LIBRARY_DIRS",
    "GBM_BACKENDS_PATH",
    "GCONV_PATH",
    "GDK_PIXBUF_MODULEDIR",
    "GDK_PIXBUF_MODULE_FILE",
    "GEGL_PATH",
    "GIO_MODULE_DIR",
    "GI_TYPELIB_PATH",
    "GSETTINGS_SCHEMA_DIR",
    "GST_PLUGIN_PATH",
    "GST_PLUGIN_SCANNER",
    "GST_PLUGIN_SYSTEM_PATH",
    "GST_PLUGIN_SYSTEM_PATH_1_0",
    "GTK_DATA_PREFIX",
    "GTK_EXE_PREFIX",
    "GTK_IM_MODULE_FILE",
    "GTK_PATH",

    // Loader.
    "LD_LIBRARY_PATH",
    "LD_PRELOAD",

    "LIBDECOR_PLUGIN_DIR",
    "LIBGL_DRIVERS_PATH",
    "LIBVA_DRIVERS_PATH",
    "PERLLIB",
    "PIPEWIRE_MODULE_DIR",
    "PYTHONHOME",
    "QT_PLUGIN_PATH",
    "SPA_PLUGIN_DIR",
    "TCL_LIBRARY",
    "TK_LIBRARY",
    "XKB_CONFIG_ROOT",
    "XTABLES_LIBDIR",
];
